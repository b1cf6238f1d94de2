//! Raw sensor message types.
//!
//! Each message on the wire is a single text line:
//! `timestamp,sensor_id,sensor_name,value`, e.g.
//! `2017-12-14T22:22:43.895Z,19,Sensor 19,0.947640`.

/// Number of comma-separated fields in a well-formed message.
pub const FIELD_COUNT: usize = 4;

/// A single sensor reading parsed from a raw message line.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    /// Producer timestamp, kept verbatim
    pub timestamp: String,
    /// 1-based sensor id; negative ids are the end-of-stream sentinel
    pub sensor_id: i64,
    /// Human-readable sensor name (not used for aggregation)
    pub sensor_name: String,
    /// Sensor value
    pub value: f64,
}

/// Why a raw message line was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line did not split into exactly [`FIELD_COUNT`] fields
    FieldCount(usize),
    /// The sensor id field is not an integer
    SensorId(String),
    /// The value field is not a number
    Value(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::FieldCount(n) => write!(f, "Expected {FIELD_COUNT} fields, got {n}"),
            ParseError::SensorId(s) => write!(f, "Invalid sensor id: {s:?}"),
            ParseError::Value(s) => write!(f, "Invalid sensor value: {s:?}"),
        }
    }
}

impl std::error::Error for ParseError {}

impl SensorReading {
    /// Parse a raw message line, reporting why it was rejected.
    pub fn try_parse(line: &str) -> Result<Self, ParseError> {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != FIELD_COUNT {
            return Err(ParseError::FieldCount(fields.len()));
        }

        let id_field = fields[1].trim();
        let sensor_id = id_field
            .parse::<i64>()
            .map_err(|_| ParseError::SensorId(id_field.to_string()))?;
        let value_field = fields[3].trim();
        let value = value_field
            .parse::<f64>()
            .map_err(|_| ParseError::Value(value_field.to_string()))?;

        Ok(Self {
            timestamp: fields[0].trim().to_string(),
            sensor_id,
            sensor_name: fields[2].to_string(),
            value,
        })
    }

    /// Parse a raw message line.
    ///
    /// Returns `None` for lines that do not have exactly four fields or whose
    /// id or value is not numeric. The latter are logged at debug level.
    pub fn parse(line: &str) -> Option<Self> {
        match Self::try_parse(line) {
            Ok(reading) => Some(reading),
            Err(ParseError::FieldCount(_)) => None,
            Err(e) => {
                tracing::debug!(line, error = %e, "Dropping sensor message");
                None
            }
        }
    }

    /// Whether this reading is the producer's end-of-stream sentinel.
    pub fn is_terminal(&self) -> bool {
        self.sensor_id < 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_formed_line() {
        let reading = SensorReading::parse("2017-12-14T22:22:43.895Z,19,Sensor 19,0.947640").unwrap();
        assert_eq!(reading.timestamp, "2017-12-14T22:22:43.895Z");
        assert_eq!(reading.sensor_id, 19);
        assert_eq!(reading.sensor_name, "Sensor 19");
        assert!((reading.value - 0.94764).abs() < 1e-9);
        assert!(!reading.is_terminal());
    }

    #[test]
    fn test_parse_rejects_wrong_field_count() {
        assert!(SensorReading::parse("t,1,n").is_none());
        assert!(SensorReading::parse("t,1,n,0.5,extra").is_none());
        assert!(SensorReading::parse("").is_none());
    }

    #[test]
    fn test_parse_rejects_non_numeric_fields() {
        assert!(SensorReading::parse("t,one,n,0.5").is_none());
        assert!(SensorReading::parse("t,1,n,high").is_none());
    }

    #[test]
    fn test_try_parse_reports_rejected_field() {
        assert_eq!(
            SensorReading::try_parse("t,1,n"),
            Err(ParseError::FieldCount(3))
        );
        assert_eq!(
            SensorReading::try_parse("t, one ,n,0.5"),
            Err(ParseError::SensorId("one".to_string()))
        );
        assert_eq!(
            SensorReading::try_parse("t,1,n,high"),
            Err(ParseError::Value("high".to_string()))
        );
    }

    #[test]
    fn test_parse_tolerates_surrounding_whitespace() {
        let reading = SensorReading::parse("t, 3 ,n, 0.25\n").unwrap();
        assert_eq!(reading.sensor_id, 3);
        assert_eq!(reading.value, 0.25);
    }

    #[test]
    fn test_negative_id_is_terminal() {
        let reading = SensorReading::parse("t,-1,n,0.0").unwrap();
        assert!(reading.is_terminal());
    }
}
