use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "ardcheck: Landsat ARD tile bundle validator", long_about = None)]
pub struct Cli {
    /// Log filter (e.g. `info`, `ard_core=debug`); ARDCHECK_LOG takes precedence when set
    #[arg(long = "log-level", global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate every bundle in a directory and write a report
    Validate {
        /// Directory holding the .tar bundles and their checksum files
        #[arg(short = 'd', long = "dir")]
        dir: PathBuf,

        /// Reference tile extent CSV (region,h,v[,hv],ulx,uly,lrx,lry)
        #[arg(short = 'c', long = "csv")]
        csv: PathBuf,

        /// XSD the embedded metadata must conform to
        #[arg(short = 'x', long = "xsd")]
        xsd: PathBuf,

        /// Directory the report is written into
        #[arg(short = 'o', long = "out")]
        out: PathBuf,

        /// Report passing checks too
        #[arg(long)]
        verbose: bool,

        /// Allowed corner difference in projected metres (0 = exact)
        #[arg(long, default_value_t = 0.0)]
        tolerance: f64,
    },

    /// Print the reference corners of one tile
    Extent {
        #[arg(long)]
        csv: PathBuf,
        /// CU, AK or HI
        region: String,
        h: u16,
        v: u16,
    },

    /// Check a bundle file name token by token
    Name { file_name: String },

    /// Print a checksum line in md5sum layout
    Digest {
        file: PathBuf,
        /// md5, sha256 or blake3
        #[arg(long, default_value = "md5")]
        algo: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_takes_short_flags() {
        let cli = Cli::try_parse_from([
            "ardcheck", "validate", "-d", "in", "-c", "tiles.csv", "-x", "ard.xsd", "-o", "out",
            "--verbose",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "warn");
        match cli.command {
            Commands::Validate {
                dir,
                verbose,
                tolerance,
                ..
            } => {
                assert_eq!(dir, PathBuf::from("in"));
                assert!(verbose);
                assert_eq!(tolerance, 0.0);
            }
            _ => panic!("expected validate"),
        }
    }

    #[test]
    fn global_log_level_and_positionals() {
        let cli = Cli::try_parse_from([
            "ardcheck", "extent", "--csv", "t.csv", "AK", "10", "5", "--log-level", "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command, Commands::Extent { h: 10, v: 5, .. }));

        assert!(Cli::try_parse_from(["ardcheck", "validate", "-d", "in"]).is_err());
    }
}
