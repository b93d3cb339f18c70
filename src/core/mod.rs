// Module declarations
pub mod error;
pub mod numeric;
pub mod value;
pub mod data_type;
pub mod column;
pub mod relation;

// Re-exports for convenience
pub use error::{BridgeError, CodecError, ExecutorError, OptionError, SchemaError, WireError};
pub use numeric::Numeric;
pub use value::Value;
pub use data_type::DataType;
pub use column::Column;
pub use relation::RelationDescriptor;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use std::cmp::Ordering;

    fn sample_relation() -> RelationDescriptor {
        RelationDescriptor::new(
            "ks",
            "events",
            vec![
                Column::new("pk", DataType::Integer),
                Column::new("ck", DataType::Timestamp),
                Column::new("old", DataType::Text).dropped(),
                Column::new("payload", DataType::Text),
            ],
        )
        .with_partition_key(&["pk"])
        .with_clustering_key(&["ck"])
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Integer(42).to_string(), "42");
        assert_eq!(Value::Double(3.25).to_string(), "3.25");
        assert_eq!(Value::Text("hello".to_string()).to_string(), "hello");
        assert_eq!(Value::Boolean(true).to_string(), "true");
        assert_eq!(Value::Bytea(vec![0xde, 0xad]).to_string(), "\\xdead");
        assert_eq!(Value::Timestamp(0).to_string(), "2000-01-01 00:00:00");
        assert_eq!(Value::Date(-1).to_string(), "1999-12-31");
        assert_eq!(Value::Time(1_500_000).to_string(), "00:00:01.500");
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Integer(42).as_int(), Some(42));
        assert_eq!(Value::SmallInt(-3).as_int(), Some(-3));
        assert_eq!(Value::Text("hello".to_string()).as_int(), None);
        assert_eq!(Value::Text("hello".to_string()).as_text(), Some("hello"));
        assert_eq!(Value::Boolean(false).as_bool(), Some(false));
        assert_eq!(Value::Null.data_type(), None);
    }

    #[test]
    fn test_chrono_round_trip() {
        let date = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(Value::date_from_naive(date), Value::Date(-10_957));

        let ts = date.and_hms_opt(0, 0, 0).unwrap();
        let value = Value::timestamp_from_naive(ts);
        assert_eq!(value, Value::Timestamp(-946_684_800_000_000));
        assert_eq!(value.to_naive_datetime(), Some(ts));

        let time = NaiveTime::from_hms_micro_opt(13, 45, 1, 250).unwrap();
        assert_eq!(Value::time_from_naive(time).to_naive_time(), Some(time));
    }

    #[test]
    fn test_cast_from_text() {
        let v = Value::Text("2024-03-01 10:00:00".to_string());
        let ts = v.cast_to(DataType::Timestamp).unwrap();
        assert_eq!(ts.to_string(), "2024-03-01 10:00:00");

        assert_eq!(
            Value::Text("70000".to_string()).cast_to(DataType::SmallInt),
            Err(CodecError::OutOfRange("70000 does not fit smallint".to_string()))
        );
        assert_eq!(
            Value::Text("t".to_string()).cast_to(DataType::Boolean),
            Ok(Value::Boolean(true))
        );
        assert!(Value::Text("nope".to_string()).cast_to(DataType::Uuid).is_err());
        assert_eq!(Value::Null.cast_to(DataType::Date), Ok(Value::Null));
    }

    #[test]
    fn test_integral_numeric_casts_to_integer() {
        let n = |s: &str| Value::Numeric(s.parse().unwrap());
        assert_eq!(n("5.00").cast_to(DataType::Integer), Ok(Value::Integer(5)));
        assert_eq!(n("-3e2").cast_to(DataType::SmallInt), Ok(Value::SmallInt(-300)));
        assert!(n("5.5").cast_to(DataType::Integer).is_err());
        assert!(matches!(n("1e12").cast_to(DataType::Integer), Err(CodecError::OutOfRange(_))));
    }

    #[test]
    fn test_compare_across_types() {
        assert_eq!(Value::Integer(5).compare(&Value::BigInt(5)), Some(Ordering::Equal));
        assert_eq!(Value::SmallInt(2).compare(&Value::Double(2.5)), Some(Ordering::Less));
        assert_eq!(
            Value::Numeric("10.50".parse().unwrap()).compare(&Value::Integer(10)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Value::Date(0).compare(&Value::Text("2000-01-02".to_string())),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Null.compare(&Value::Integer(1)), None);
        assert_eq!(Value::Boolean(true).compare(&Value::Integer(1)), None);
    }

    #[test]
    fn test_relation_lookup_skips_dropped() {
        let rel = sample_relation();
        assert_eq!(rel.column_index("payload"), Some(3));
        assert_eq!(rel.column_index("old"), None);
        assert!(matches!(rel.require_column("old"), Err(SchemaError::UnknownColumn(_))));
        assert_eq!(rel.primary_key().collect::<Vec<_>>(), vec!["pk", "ck"]);
        assert!(rel.is_key_column("ck"));
        assert!(!rel.is_key_column("payload"));
    }

    #[test]
    fn test_relation_validate() {
        assert!(sample_relation().validate().is_ok());

        let bad_key = sample_relation().with_partition_key(&["missing"]);
        assert_eq!(bad_key.validate(), Err(SchemaError::UnknownColumn("missing".to_string())));

        let dup = RelationDescriptor::new(
            "ks",
            "t",
            vec![Column::new("a", DataType::Text), Column::new("a", DataType::Integer)],
        );
        assert_eq!(dup.validate(), Err(SchemaError::DuplicateColumn("a".to_string())));

        let empty = RelationDescriptor::new("ks", "t", vec![]);
        assert_eq!(empty.validate(), Err(SchemaError::NoColumns));
    }
}
