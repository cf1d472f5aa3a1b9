//! # Collider file loader
//!
//! Reads obstacle files in the colliders format:
//!
//! ```text
//! lat0 37.792480, lon0 -122.397450
//! posX,posY,posZ,halfSizeX,halfSizeY,halfSizeZ
//! -310.2389,-439.2315,85.5,5,5,85.5
//! ...
//! ```
//!
//! The first line gives the global home position, the second is a header, and each following row
//! describes one obstacle as `(north, east, alt, d_north, d_east, d_alt)` in meters.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::map::{MapError, Obstacle, OBSTACLE_RECORD_LEN};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Line number of the first obstacle row, counting from 1. The CSV reader starts counting after the
/// home line.
const FIRST_ROW_LINE: usize = 3;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Global position of the local frame origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeodeticHome {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub alt_m: f64,
}

/// The contents of a colliders file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColliderData {
    pub home: GeodeticHome,
    pub obstacles: Vec<Obstacle>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("Could not read the colliders file: {0}")]
    Io(#[from] std::io::Error),

    #[error("The colliders file is empty")]
    MissingHomeLine,

    #[error("Could not parse the home position from {0:?}")]
    InvalidHomeLine(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Line {0}, field {1}: {2:?} is not a number")]
    InvalidField(usize, usize, String),

    #[error("Line {0}: {1}")]
    InvalidRecord(usize, MapError),

    #[error("The colliders file contains no obstacles")]
    NoObstacles,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Load a colliders file from disk.
pub fn load_colliders<P: AsRef<Path>>(path: P) -> Result<ColliderData, LoaderError> {
    let file = File::open(path.as_ref())?;

    let data = parse_colliders(BufReader::new(file))?;

    info!(
        "Loaded {} obstacles from {:?}, home at ({:.6}, {:.6})",
        data.obstacles.len(),
        path.as_ref(),
        data.home.lat_deg,
        data.home.lon_deg
    );

    Ok(data)
}

/// Parse colliders data from a reader.
pub fn parse_colliders<R: BufRead>(mut reader: R) -> Result<ColliderData, LoaderError> {
    let mut home_line = String::new();
    if reader.read_line(&mut home_line)? == 0 {
        return Err(LoaderError::MissingHomeLine);
    }
    let home = parse_home(&home_line)?;

    debug!("Colliders home line: {:?}", home);

    // The header line is consumed by the CSV reader
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut obstacles = Vec::new();
    let mut record = [0f64; OBSTACLE_RECORD_LEN];

    for (i, row) in csv_reader.records().enumerate() {
        let row = row?;
        let line = row
            .position()
            .map_or(FIRST_ROW_LINE + i, |p| p.line() as usize + 1);

        // Skip blank trailing lines
        if row.iter().all(|f| f.is_empty()) {
            continue;
        }

        if row.len() != OBSTACLE_RECORD_LEN {
            return Err(LoaderError::InvalidRecord(
                line,
                MapError::InvalidRecordLength(row.len()),
            ));
        }

        for (j, field) in row.iter().enumerate() {
            record[j] = field
                .parse()
                .map_err(|_| LoaderError::InvalidField(line, j, field.into()))?;
        }

        let obstacle =
            Obstacle::from_record(&record).map_err(|e| LoaderError::InvalidRecord(line, e))?;
        obstacle.validate().map_err(|reason| {
            LoaderError::InvalidRecord(line, MapError::InvalidObstacle(obstacles.len(), reason))
        })?;
        obstacles.push(obstacle);
    }

    if obstacles.is_empty() {
        return Err(LoaderError::NoObstacles);
    }

    Ok(ColliderData { home, obstacles })
}

/// Parse a line of the form `lat0 <deg>, lon0 <deg>`.
fn parse_home(line: &str) -> Result<GeodeticHome, LoaderError> {
    let invalid = || LoaderError::InvalidHomeLine(line.trim().into());

    let mut lat_deg = None;
    let mut lon_deg = None;

    for part in line.split(',') {
        let mut words = part.split_whitespace();
        let key = words.next().ok_or_else(invalid)?;
        let value: f64 = words
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(invalid)?;

        if words.next().is_some() || !value.is_finite() {
            return Err(invalid());
        }

        match key {
            "lat0" => lat_deg = Some(value),
            "lon0" => lon_deg = Some(value),
            _ => return Err(invalid()),
        }
    }

    match (lat_deg, lon_deg) {
        (Some(lat_deg), Some(lon_deg)) => Ok(GeodeticHome {
            lat_deg,
            lon_deg,
            alt_m: 0.0,
        }),
        _ => Err(invalid()),
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const SAMPLE: &str = "lat0 37.792480, lon0 -122.397450\n\
                          posX,posY,posZ,halfSizeX,halfSizeY,halfSizeZ\n\
                          -310.2389,-439.2315,85.5,5,5,85.5\n\
                          -300.2389, -439.2315, 85.5, 5, 5, 85.5\n";

    #[test]
    fn test_parse_sample() -> Result<(), LoaderError> {
        let data = parse_colliders(SAMPLE.as_bytes())?;

        assert_eq!(
            data.home,
            GeodeticHome {
                lat_deg: 37.79248,
                lon_deg: -122.39745,
                alt_m: 0.0
            }
        );
        assert_eq!(data.obstacles.len(), 2);
        assert_eq!(
            data.obstacles[1],
            Obstacle::new(-300.2389, -439.2315, 85.5, 5.0, 5.0, 85.5)
        );

        Ok(())
    }

    #[test]
    fn test_trailing_blank_line() -> Result<(), LoaderError> {
        let text = format!("{}\n", SAMPLE);
        assert_eq!(parse_colliders(text.as_bytes())?.obstacles.len(), 2);

        Ok(())
    }

    #[test]
    fn test_home_line() {
        assert!(parse_home("lat0 1.5, lon0 -2").is_ok());
        assert!(parse_home("lon0 -2, lat0 1.5\r\n").is_ok());

        for bad in &["", "lat0 1.5", "lat0 x, lon0 2", "alt0 1, lon0 2", "lat0 1 2, lon0 3"] {
            assert!(
                matches!(parse_home(bad), Err(LoaderError::InvalidHomeLine(_))),
                "{:?}",
                bad
            );
        }
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            parse_colliders("".as_bytes()),
            Err(LoaderError::MissingHomeLine)
        ));

        let header_only = "lat0 1, lon0 2\na,b,c,d,e,f\n";
        assert!(matches!(
            parse_colliders(header_only.as_bytes()),
            Err(LoaderError::NoObstacles)
        ));

        let short_row = "lat0 1, lon0 2\na,b,c,d,e,f\n1,2,3,4,5,6\n1,2,3\n";
        assert!(matches!(
            parse_colliders(short_row.as_bytes()),
            Err(LoaderError::InvalidRecord(4, MapError::InvalidRecordLength(3)))
        ));

        let not_number = "lat0 1, lon0 2\na,b,c,d,e,f\n1,2,three,4,5,6\n";
        assert!(matches!(
            parse_colliders(not_number.as_bytes()),
            Err(LoaderError::InvalidField(3, 2, _))
        ));

        let negative_extent = "lat0 1, lon0 2\na,b,c,d,e,f\n1,2,3,-4,5,6\n";
        assert!(matches!(
            parse_colliders(negative_extent.as_bytes()),
            Err(LoaderError::InvalidRecord(3, MapError::InvalidObstacle(_, _)))
        ));
    }

    #[test]
    fn test_sample_file() -> Result<(), LoaderError> {
        let data = load_colliders(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../data/colliders_sample.csv"
        ))?;

        assert_eq!(data.obstacles.len(), 48);
        assert_eq!(data.home.lat_deg, 37.79248);

        Ok(())
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_colliders("/nonexistent/colliders.csv"),
            Err(LoaderError::Io(_))
        ));
    }
}
