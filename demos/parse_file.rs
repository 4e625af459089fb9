//! Parses a `.proto` file named on the command line and prints the
//! resulting AST, or a `file:line:col: message` diagnostic on failure.
//!
//! ```text
//! cargo run --example parse_file -- path/to/file.proto
//! ```

use std::env;
use std::fs;
use std::process;

fn main() {
    env_logger::init();

    let path = match env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: parse_file <path.proto>");
            process::exit(2);
        }
    };

    let source = match fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}: {}", path, e);
            process::exit(1);
        }
    };

    match protoparse::parse(&source) {
        Ok(file) => println!("{:#?}", file),
        Err(e) => {
            eprintln!("{}: {}", path, e);
            process::exit(1);
        }
    }
}
