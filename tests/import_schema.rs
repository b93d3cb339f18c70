// Schema import against the in-memory cluster's system_schema.columns
use cqlbridge::connection::memory::Submitted;
use cqlbridge::import::import_with;
use cqlbridge::{
    import_schema, BridgeError, Column, ConnectionConfig, ConnectionProvider, Consistency, DataType, MemoryCluster,
    RelationDescriptor, Session, TableFilter, WireError,
};

fn cluster() -> MemoryCluster {
    let cluster = MemoryCluster::new();
    cluster.create_table(
        RelationDescriptor::new(
            "shop",
            "orders",
            vec![
                Column::new("note", DataType::Text),
                Column::new("placed_at", DataType::TimestampTz),
                Column::new("item", DataType::Integer),
                Column::new("customer", DataType::Uuid),
                Column::new("region", DataType::Text),
                Column::new("tags", DataType::Text),
            ],
        )
        .with_partition_key(&["region", "customer"])
        .with_clustering_key(&["placed_at", "item"]),
    );
    cluster.create_table(
        RelationDescriptor::new(
            "shop",
            "customers",
            vec![Column::new("id", DataType::Uuid), Column::new("name", DataType::Text)],
        )
        .with_partition_key(&["id"]),
    );
    cluster.create_table(
        RelationDescriptor::new("other", "ignored", vec![Column::new("id", DataType::Integer)])
            .with_partition_key(&["id"]),
    );
    cluster.set_cql_type("shop", "orders", "tags", "list<int>").unwrap();
    cluster
}

fn table_names(relations: &[RelationDescriptor]) -> Vec<&str> {
    relations.iter().map(|r| r.table.as_str()).collect()
}

#[test]
fn imports_every_table_of_the_keyspace() {
    let cluster = cluster();
    let relations = import_with(&cluster, &ConnectionConfig::default(), "shop", &TableFilter::All).unwrap();
    assert_eq!(table_names(&relations), vec!["customers", "orders"]);
    assert!(relations.iter().all(|r| r.keyspace == "shop"));
    assert_eq!(cluster.open_sessions(), 0);
}

#[test]
fn key_columns_come_first_in_key_order() {
    let cluster = cluster();
    let relations = import_with(&cluster, &ConnectionConfig::default(), "shop", &TableFilter::All).unwrap();
    let orders = &relations[1];

    assert_eq!(orders.partition_key, vec!["region", "customer"]);
    assert_eq!(orders.clustering_key, vec!["placed_at", "item"]);
    let names: Vec<_> = orders.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(&names[..4], &["region", "customer", "placed_at", "item"]);
    assert_eq!(names.len(), 6);
    assert!(names[4..].contains(&"note"));
    assert!(names[4..].contains(&"tags"));
}

#[test]
fn types_map_back_and_collections_become_text() {
    let cluster = cluster();
    let relations = import_with(&cluster, &ConnectionConfig::default(), "shop", &TableFilter::All).unwrap();
    let orders = &relations[1];
    let type_of = |name: &str| orders.column(name).map(|c| c.data_type);

    assert_eq!(type_of("customer"), Some(DataType::Uuid));
    assert_eq!(type_of("placed_at"), Some(DataType::TimestampTz));
    assert_eq!(type_of("item"), Some(DataType::Integer));
    assert_eq!(type_of("tags"), Some(DataType::Text));
}

#[test]
fn limit_to_and_except_select_tables() {
    let cluster = cluster();
    let config = ConnectionConfig::default();

    let only = TableFilter::LimitTo(vec!["orders".to_string()]);
    assert_eq!(table_names(&import_with(&cluster, &config, "shop", &only).unwrap()), vec!["orders"]);

    let except = TableFilter::Except(vec!["orders".to_string()]);
    assert_eq!(table_names(&import_with(&cluster, &config, "shop", &except).unwrap()), vec!["customers"]);

    let missing = TableFilter::LimitTo(vec!["nope".to_string()]);
    assert!(import_with(&cluster, &config, "shop", &missing).unwrap().is_empty());
}

#[test]
fn unknown_keyspace_imports_nothing() {
    let cluster = cluster();
    let relations = import_with(&cluster, &ConnectionConfig::default(), "absent", &TableFilter::All).unwrap();
    assert!(relations.is_empty());
}

#[test]
fn import_reads_at_requested_consistency() {
    let cluster = cluster();
    let mut session = cluster.connect(&ConnectionConfig::default()).unwrap();
    import_schema(&mut session, "shop", &TableFilter::All, Consistency::LocalOne).unwrap();
    session.close();

    match cluster.submitted().as_slice() {
        [Submitted::Execute { cql, consistency }] => {
            assert!(cql.contains("FROM system_schema.columns WHERE keyspace_name = 'shop'"));
            assert_eq!(*consistency, Consistency::LocalOne);
        }
        other => panic!("unexpected requests: {other:?}"),
    }
}

#[test]
fn imported_descriptors_serialize_to_json() {
    let cluster = cluster();
    let only = TableFilter::LimitTo(vec!["customers".to_string()]);
    let relations = import_with(&cluster, &ConnectionConfig::default(), "shop", &only).unwrap();
    let json = serde_json::to_value(&relations[0]).unwrap();
    assert_eq!(json["table"], "customers");
    assert_eq!(json["partition_key"][0], "id");
}

#[test]
fn refused_connection_fails_the_import() {
    let cluster = cluster();
    cluster.refuse_connections("Connection refused");
    let err = import_with(&cluster, &ConnectionConfig::default(), "shop", &TableFilter::All).unwrap_err();
    assert!(matches!(err, BridgeError::Wire(WireError::Connection(_))));
}
