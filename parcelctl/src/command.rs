//! Shell command grammar.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Load(PathBuf),
    Export(PathBuf),
    Radius { x: f64, y: f64, r: f64 },
    Price { min: f64, max: f64 },
    Range { min: f64, max: f64 },
    Search(f64),
    Compare { min: f64, max: f64 },
    Stats,
    Tree,
    Log(String),
    Help,
    Exit,
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`, try `help`")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid number {0:?}")]
    InvalidNumber(String),
}

pub const HELP: &str = "\
load <path>          load a record file into all three indexes
export <path>        write the loaded records to a file, ascending by price
radius <x> <y> <r>   records within r of (x, y)            [quadtree]
price <min> <max>    records priced in [min, max]          [red-black]
range <min> <max>    records priced in [min, max]          [b+ tree]
search <price>       first record at exactly this price    [both]
compare <min> <max>  time both range backends and diff their results
stats                index shapes
tree                 dump the b+ tree level by level
log <filter>         replace the log filter, e.g. `parcel_index=trace`
help                 this text
exit | \\q            leave the shell";

impl Command {
    /// Parse one shell line.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };
        let args: Vec<&str> = rest.split_whitespace().collect();

        match name.to_ascii_lowercase().as_str() {
            "" => Err(CommandError::Empty),
            "load" if !rest.is_empty() => Ok(Command::Load(PathBuf::from(rest))),
            "load" => Err(CommandError::Usage("load <path>")),
            "export" if !rest.is_empty() => Ok(Command::Export(PathBuf::from(rest))),
            "export" => Err(CommandError::Usage("export <path>")),
            "radius" => {
                let [x, y, r] = numbers::<3>(&args, "radius <x> <y> <r>")?;
                Ok(Command::Radius { x, y, r })
            }
            "price" => {
                let [min, max] = numbers::<2>(&args, "price <min> <max>")?;
                Ok(Command::Price { min, max })
            }
            "range" => {
                let [min, max] = numbers::<2>(&args, "range <min> <max>")?;
                Ok(Command::Range { min, max })
            }
            "search" => {
                let [price] = numbers::<1>(&args, "search <price>")?;
                Ok(Command::Search(price))
            }
            "compare" => {
                let [min, max] = numbers::<2>(&args, "compare <min> <max>")?;
                Ok(Command::Compare { min, max })
            }
            "log" if !rest.is_empty() => Ok(Command::Log(rest.to_string())),
            "log" => Err(CommandError::Usage("log <filter>")),
            "stats" if args.is_empty() => Ok(Command::Stats),
            "tree" if args.is_empty() => Ok(Command::Tree),
            "help" | "?" => Ok(Command::Help),
            "exit" | "quit" | "\\q" => Ok(Command::Exit),
            "stats" => Err(CommandError::Usage("stats")),
            "tree" => Err(CommandError::Usage("tree")),
            _ => Err(CommandError::Unknown(name.to_string())),
        }
    }
}

/// Exactly `N` numeric arguments. NaN is refused; infinities are allowed as
/// open range ends.
fn numbers<const N: usize>(args: &[&str], usage: &'static str) -> Result<[f64; N], CommandError> {
    if args.len() != N {
        return Err(CommandError::Usage(usage));
    }
    let mut out = [0.0; N];
    for (slot, raw) in out.iter_mut().zip(args) {
        let value: f64 = raw
            .parse()
            .map_err(|_| CommandError::InvalidNumber(raw.to_string()))?;
        if value.is_nan() {
            return Err(CommandError::InvalidNumber(raw.to_string()));
        }
        *slot = value;
    }
    Ok(out)
}
