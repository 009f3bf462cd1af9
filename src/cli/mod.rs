//! Command-line interface.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `init` | Create the schema and seed pet types |
//! | `types` | List pet types |
//! | `postings list\|get\|add\|matches` | Lost pets |
//! | `sightings list\|get\|add\|matches` | Found pets |
//! | `match contact\|remove` | Match bookkeeping |
//! | `query` | Show the SQL for filter groups |
//!
//! # Example Usage
//!
//! ```bash
//! lostpets postings add --date 2019-03-02 --email owner@example.com \
//!     --type Dog --pet-name Rex --color Brown --location Riverside
//! lostpets sightings list -g "petcolor=brown;date>=2019-03-01" -g "location=riverside"
//! lostpets query --kind postings -g "id in 1,2,3"
//! ```

mod args;
mod commands;
mod output;

pub use args::{Cli, Commands, KindArg, MatchAction, RecordAction, RecordArgs, parse_groups};
pub use commands::execute;
pub use output::write_json;
