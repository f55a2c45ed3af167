use clap::{Parser, Subcommand};
use gfxs_pixels::DisplaySize;
use std::path::PathBuf;

/// Command-line client for a GFXS render server.
#[derive(Parser, Debug)]
#[command(name = "gfxs", version, about)]
pub struct Args {
    /// Render server URL (overrides config and GFXS_SERVER)
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Config file (default: <config dir>/gfxs/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Keep filters in this directory instead of on the server
    #[arg(long, global = true)]
    pub filters_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Re-render a script whenever it changes on disk
    Watch {
        script: PathBuf,

        /// Directory for rendered images and archives
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Render a script once
    Render {
        script: PathBuf,

        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Render a script against several images into one archive
    Batch {
        script: PathBuf,

        #[arg(required = true)]
        images: Vec<PathBuf>,

        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Make an image the server's current image, then render a script on it
    Upload {
        image: PathBuf,

        script: PathBuf,

        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Manage stored filters
    Filters {
        #[command(subcommand)]
        command: FiltersCommand,
    },

    /// Print the pixel under a display position
    Sample {
        image: PathBuf,

        /// Displayed size as WIDTHxHEIGHT (default: natural size)
        #[arg(long, value_parser = parse_size)]
        display: Option<DisplaySize>,

        /// Display position as X,Y
        #[arg(long, value_parser = parse_point)]
        at: (f64, f64),
    },
}

#[derive(Subcommand, Debug)]
pub enum FiltersCommand {
    /// List stored filter names
    List,

    /// Print a stored filter
    Show { name: String },

    /// Store a script under a name
    Save { name: String, script: PathBuf },
}

/// Parse `WIDTHxHEIGHT`.
pub fn parse_size(s: &str) -> Result<DisplaySize, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let width = w.trim().parse().map_err(|e| format!("bad width '{w}': {e}"))?;
    let height = h.trim().parse().map_err(|e| format!("bad height '{h}': {e}"))?;
    Ok(DisplaySize::new(width, height))
}

/// Parse `X,Y`.
pub fn parse_point(s: &str) -> Result<(f64, f64), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{s}'"))?;
    let x = x.trim().parse().map_err(|e| format!("bad x '{x}': {e}"))?;
    let y = y.trim().parse().map_err(|e| format!("bad y '{y}': {e}"))?;
    Ok((x, y))
}
