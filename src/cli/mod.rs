pub mod args;

use clap::Parser;

pub use args::{Arguments, Dimension};

pub fn parse() -> Arguments {
    Arguments::parse()
}
