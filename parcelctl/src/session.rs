//! Executes shell commands against a loaded catalog.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use parcel_index::Bounds;
use parcel_log::LogHandle;
use parcel_record::{write_records, Point, Record};
use serde_json::json;
use tracing::info;

use crate::catalog::{same_multiset, Catalog};
use crate::command::{Command, HELP};
use crate::config::{Config, OutputFormat};

/// Whether the shell should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Session {
    catalog: Catalog,
    order: usize,
    bounds: Bounds,
    output: OutputFormat,
    limit: usize,
    log: Option<LogHandle>,
}

impl Session {
    pub fn new(config: &Config, log: Option<LogHandle>) -> Result<Self> {
        Ok(Self {
            catalog: Catalog::new(config.bplus_order, config.spatial_bounds)?,
            order: config.bplus_order,
            bounds: config.spatial_bounds,
            output: config.output,
            limit: config.result_limit,
            log,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn execute<W: Write>(&mut self, command: Command, out: &mut W) -> Result<Flow> {
        match command {
            Command::Exit => return Ok(Flow::Exit),
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Load(path) => {
                // Replace only once the whole file indexed cleanly.
                self.catalog = Catalog::open(self.order, self.bounds, &path)?;
                match self.output {
                    OutputFormat::Text => writeln!(
                        out,
                        "loaded {} records from {}",
                        self.catalog.len(),
                        path.display()
                    )?,
                    OutputFormat::Json => writeln!(
                        out,
                        "{}",
                        json!({ "loaded": self.catalog.len(), "path": path })
                    )?,
                }
            }
            Command::Export(path) => {
                let records: Vec<Record> =
                    self.catalog.multiway().iter().map(|(_, r)| r.clone()).collect();
                let file = File::create(&path)
                    .with_context(|| format!("creating {}", path.display()))?;
                write_records(BufWriter::new(file), &records)
                    .with_context(|| format!("writing {}", path.display()))?;
                info!(path = %path.display(), records = records.len(), "exported records");
                match self.output {
                    OutputFormat::Text => writeln!(
                        out,
                        "exported {} records to {}",
                        records.len(),
                        path.display()
                    )?,
                    OutputFormat::Json => writeln!(
                        out,
                        "{}",
                        json!({ "exported": records.len(), "path": path })
                    )?,
                }
            }
            Command::Radius { x, y, r } => {
                let found = self.catalog.spatial().find_in_radius(Point::new(x, y), r);
                self.print_records(out, "radius", &found)?;
            }
            Command::Price { min, max } => {
                let found = self.catalog.ordered().price_range(min, max);
                self.print_records(out, "price", &found)?;
            }
            Command::Range { min, max } => {
                let found = self.catalog.multiway().range_query(&min, &max);
                self.print_records(out, "range", &found)?;
            }
            Command::Search(price) => {
                let ordered = self.catalog.ordered().search(price);
                let multiway = self.catalog.multiway().search(&price);
                match self.output {
                    OutputFormat::Text => {
                        writeln!(out, "red-black: {}", describe(ordered))?;
                        writeln!(out, "b+ tree:   {}", describe(multiway))?;
                    }
                    OutputFormat::Json => writeln!(
                        out,
                        "{}",
                        json!({ "redblack": ordered, "bplus": multiway })
                    )?,
                }
            }
            Command::Compare { min, max } => self.compare(out, min, max)?,
            Command::Stats => {
                let stats = self.catalog.stats();
                match self.output {
                    OutputFormat::Text => {
                        let b = stats.spatial_bounds;
                        writeln!(out, "records:          {}", stats.records)?;
                        writeln!(
                            out,
                            "quadtree:         depth {} over [{}, {}) x [{}, {})",
                            stats.quadtree_depth, b.left, b.right, b.top, b.bottom
                        )?;
                        writeln!(
                            out,
                            "red-black:        black height {}",
                            stats.redblack_black_height
                        )?;
                        writeln!(
                            out,
                            "b+ tree:          height {} at order {}",
                            stats.bplus_height, stats.bplus_order
                        )?;
                    }
                    OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(&stats)?)?,
                }
            }
            Command::Tree => match self.output {
                OutputFormat::Text => write!(out, "{}", self.catalog.multiway())?,
                OutputFormat::Json => writeln!(
                    out,
                    "{}",
                    json!({ "tree": self.catalog.multiway().to_string() })
                )?,
            },
            Command::Log(filter) => {
                let handle = self
                    .log
                    .as_ref()
                    .ok_or_else(|| anyhow!("logging is not initialised"))?;
                handle.set_filter(&filter)?;
                writeln!(out, "log filter set to {filter}")?;
            }
        }
        Ok(Flow::Continue)
    }

    fn compare<W: Write>(&self, out: &mut W, min: f64, max: f64) -> Result<()> {
        let start = Instant::now();
        let ordered = self.catalog.ordered().price_range(min, max);
        let ordered_time = start.elapsed();

        let start = Instant::now();
        let multiway = self.catalog.multiway().range_query(&min, &max);
        let multiway_time = start.elapsed();

        let matches = same_multiset(&ordered, &multiway);
        info!(
            min,
            max,
            redblack = ordered.len(),
            bplus = multiway.len(),
            redblack_us = micros(ordered_time),
            bplus_us = micros(multiway_time),
            matches,
            "compared range backends"
        );
        match self.output {
            OutputFormat::Text => {
                writeln!(out, "red-black: {} results in {:?}", ordered.len(), ordered_time)?;
                writeln!(out, "b+ tree:   {} results in {:?}", multiway.len(), multiway_time)?;
                writeln!(out, "results {}", if matches { "match" } else { "DIFFER" })?;
            }
            OutputFormat::Json => writeln!(
                out,
                "{}",
                json!({
                    "redblack": { "count": ordered.len(), "micros": micros(ordered_time) },
                    "bplus": { "count": multiway.len(), "micros": micros(multiway_time) },
                    "matches": matches,
                })
            )?,
        }
        Ok(())
    }

    fn print_records<W: Write>(&self, out: &mut W, query: &str, records: &[&Record]) -> Result<()> {
        let shown = match self.limit {
            0 => records.len(),
            limit => limit.min(records.len()),
        };
        match self.output {
            OutputFormat::Text => {
                for record in &records[..shown] {
                    writeln!(out, "{record}")?;
                }
                if shown < records.len() {
                    writeln!(out, "{} results, showing {shown}", records.len())?;
                } else {
                    writeln!(out, "{} results", records.len())?;
                }
            }
            OutputFormat::Json => writeln!(
                out,
                "{}",
                json!({ "query": query, "count": records.len(), "records": &records[..shown] })
            )?,
        }
        Ok(())
    }
}

fn describe(record: Option<&Record>) -> String {
    record.map_or_else(|| "not found".to_string(), Record::to_string)
}

fn micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}
