use northwind_data::context::{employee_internal_map, employee_map};
use northwind_data::{
    northwind_model, ColumnMap, ColumnType, ConnectionTarget, DataContext, Employee,
    EmployeeExternal, EmployeeInternal, ForeignKey, Model, ModelError, OnDelete, RelationKind,
    RepoError, TableMap,
};
use std::sync::Arc;

#[test]
fn northwind_model_maps_three_tables() {
    let model = northwind_model().unwrap();

    let names: Vec<&str> = model.tables().map(TableMap::name).collect();
    assert_eq!(names, vec!["Employees", "EmployeeInternal", "EmployeeExternal"]);
    assert_eq!(model.table::<Employee>().unwrap().name(), "Employees");
    assert_eq!(model.entity_for_table("EmployeeExternal"), Some("EmployeeExternal"));
}

#[test]
fn employee_mapping_carries_column_rules() {
    let model = northwind_model().unwrap();
    let employees = model.table::<Employee>().unwrap();

    assert_eq!(employees.key_column().unwrap().name, "EmployeeID");
    let last_name = employees.column("LastName").unwrap();
    assert!(last_name.required);
    assert_eq!(last_name.max_length, Some(20));
    let first_name = employees.column("FirstName").unwrap();
    assert!(first_name.required);
    assert_eq!(first_name.max_length, Some(10));
    assert!(!employees.column("City").unwrap().required);

    assert_eq!(
        employees.relation("Manager").unwrap().kind,
        RelationKind::Reference {
            foreign_key: "ReportsTo",
            target: "Employees",
        }
    );
    assert_eq!(
        employees.relation("DirectReports").unwrap().kind,
        RelationKind::Collection {
            target: "Employees",
            foreign_key: "ReportsTo",
        }
    );
}

#[test]
fn specializations_share_the_base_key() {
    let model = northwind_model().unwrap();

    for table in [
        model.table::<EmployeeInternal>().unwrap(),
        model.table::<EmployeeExternal>().unwrap(),
    ] {
        let key = table.key_column().unwrap();
        assert_eq!(key.name, "EmployeeID");
        assert_eq!(
            key.references,
            Some(ForeignKey::new("Employees", "EmployeeID").on_delete(OnDelete::Cascade))
        );
        assert_eq!(table.relation("Employee").unwrap().target(), "Employees");
    }

    let consultant = model
        .table::<EmployeeExternal>()
        .unwrap()
        .column("ConsultantName")
        .unwrap();
    assert_eq!(consultant.column_type, ColumnType::Varchar);
    assert_eq!(consultant.max_length, Some(100));
    assert!(consultant.required);
}

#[test]
fn every_entity_field_must_have_a_column() {
    let err = Model::builder()
        .entity::<Employee>(
            TableMap::new("Employees")
                .key("EmployeeID", ColumnType::Integer)
                .property(ColumnMap::new("LastName", ColumnType::Text))
                .property(ColumnMap::new("FirstName", ColumnType::Text)),
        )
        .build()
        .unwrap_err();

    assert_eq!(
        err,
        ModelError::UnmappedField {
            entity: "Employee",
            column: "Address",
        }
    );
}

#[test]
fn every_column_must_have_an_entity_field() {
    let err = Model::builder()
        .entity::<Employee>(employee_map().property(ColumnMap::new("Notes", ColumnType::Text)))
        .build()
        .unwrap_err();

    assert_eq!(
        err,
        ModelError::UnknownColumn {
            table: "Employees",
            column: "Notes",
        }
    );
}

#[test]
fn key_declarations_are_checked() {
    let missing = Model::builder()
        .entity::<Employee>(TableMap::new("Employees"))
        .build()
        .unwrap_err();
    assert_eq!(missing, ModelError::MissingKey("Employees"));

    let mismatched = Model::builder()
        .entity::<Employee>(TableMap::new("Employees").key("LastName", ColumnType::Text))
        .build()
        .unwrap_err();
    assert_eq!(
        mismatched,
        ModelError::KeyMismatch {
            table: "Employees",
            expected: "EmployeeID",
            found: "LastName",
        }
    );
}

#[test]
fn duplicate_registrations_are_rejected() {
    let entity = Model::builder()
        .entity::<Employee>(employee_map())
        .entity::<Employee>(employee_map())
        .build()
        .unwrap_err();
    assert_eq!(entity, ModelError::DuplicateEntity("Employee"));

    let table = Model::builder()
        .entity::<Employee>(employee_map())
        .entity::<EmployeeInternal>(
            TableMap::new("Employees").key("EmployeeID", ColumnType::Integer),
        )
        .build()
        .unwrap_err();
    assert_eq!(table, ModelError::DuplicateTable("Employees"));

    let column = Model::builder()
        .entity::<Employee>(employee_map().property(ColumnMap::new("City", ColumnType::Text)))
        .build()
        .unwrap_err();
    assert_eq!(
        column,
        ModelError::DuplicateColumn {
            table: "Employees",
            column: "City",
        }
    );
}

#[test]
fn relations_must_be_navigation_members_with_mapped_targets() {
    let unknown = Model::builder()
        .entity::<Employee>(employee_map().reference("Mentor", "ReportsTo", "Employees"))
        .build()
        .unwrap_err();
    assert_eq!(
        unknown,
        ModelError::UnknownRelation {
            table: "Employees",
            relation: "Mentor",
        }
    );

    let orphan = Model::builder()
        .entity::<EmployeeInternal>(employee_internal_map())
        .build()
        .unwrap_err();
    assert!(matches!(
        orphan,
        ModelError::InvalidRelation {
            table: "EmployeeInternal",
            relation: "Employee",
            ..
        }
    ));
}

#[test]
fn foreign_keys_must_target_mapped_columns() {
    let err = Model::builder()
        .entity::<Employee>(
            TableMap::new("Employees")
                .key("EmployeeID", ColumnType::Integer)
                .property(ColumnMap::new("LastName", ColumnType::Text).required())
                .property(ColumnMap::new("FirstName", ColumnType::Text).required())
                .property(ColumnMap::new("Address", ColumnType::Text))
                .property(ColumnMap::new("City", ColumnType::Text))
                .property(ColumnMap::new("Region", ColumnType::Text))
                .property(ColumnMap::new("PostalCode", ColumnType::Text))
                .property(ColumnMap::new("Country", ColumnType::Text))
                .property(
                    ColumnMap::new("ReportsTo", ColumnType::Integer)
                        .references(ForeignKey::new("Employees", "ManagerID")),
                ),
        )
        .build()
        .unwrap_err();

    assert!(matches!(
        err,
        ModelError::InvalidForeignKey {
            table: "Employees",
            column: "ReportsTo",
            ..
        }
    ));
}

#[test]
fn identifiers_must_be_plain_sql_names() {
    let err = Model::builder()
        .entity::<Employee>(TableMap::new("Employees; DROP TABLE x"))
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        ModelError::InvalidIdentifier("Employees; DROP TABLE x".to_string())
    );
}

#[test]
fn repository_for_unmapped_entity_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let model = Model::builder()
        .entity::<Employee>(employee_map())
        .build()
        .unwrap();
    let context = DataContext::with_model(
        "EmployeesOnly",
        ConnectionTarget::File(dir.path().join("northwind.db")),
        Arc::new(model),
    )
    .unwrap();

    assert!(context.repository::<Employee>().is_ok());
    match context.repository::<EmployeeExternal>() {
        Err(RepoError::UnmappedEntity(entity)) => assert_eq!(entity, "EmployeeExternal"),
        Err(other) => panic!("expected unmapped entity, got {other}"),
        Ok(_) => panic!("expected unmapped entity"),
    }
    assert_eq!(context.sessions_opened(), 0);
}
