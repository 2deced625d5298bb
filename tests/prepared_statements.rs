#![allow(missing_docs)]

use std::cell::{Cell, RefCell};
use std::sync::mpsc;
use std::time::Duration;

use quill::query::{
    Backend, Column, Condition, DeleteQuery, Entity, MemoryBackend, QueryEngine, SelectQuery,
    Statement, StatementKind, Value,
};
use quill::{QueryError, Result};

/// Captures the last delete/select it saw and serves canned rows.
#[derive(Default)]
struct Capture {
    calls: Cell<usize>,
    last_delete: RefCell<Option<DeleteQuery>>,
    last_select: RefCell<Option<SelectQuery>>,
    rows: Vec<Entity>,
}

impl Capture {
    fn serving(rows: Vec<Entity>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }
}

impl Backend for Capture {
    fn select(&self, query: &SelectQuery) -> Result<Vec<Entity>> {
        self.calls.set(self.calls.get() + 1);
        *self.last_select.borrow_mut() = Some(query.clone());
        Ok(self.rows.clone())
    }

    fn delete(&self, query: &DeleteQuery) -> Result<()> {
        self.calls.set(self.calls.get() + 1);
        *self.last_delete.borrow_mut() = Some(query.clone());
        Ok(())
    }

    fn insert(&self, entity: &Entity, _ttl: Option<Duration>) -> Result<Entity> {
        self.calls.set(self.calls.get() + 1);
        Ok(entity.clone())
    }

    fn update(&self, entity: &Entity) -> Result<Entity> {
        self.calls.set(self.calls.get() + 1);
        Ok(entity.clone())
    }
}

fn god(name: &str) -> Entity {
    Entity::new("God").with("name", name)
}

#[test]
fn bound_delete_reaches_backend_with_value() {
    let engine = QueryEngine::new();
    let backend = Capture::default();
    let mut prepared = engine
        .prepare("delete from X where age = @age", &backend)
        .unwrap();
    assert_eq!(prepared.kind(), StatementKind::Delete);
    assert_eq!(prepared.params(), ["age".to_owned()]);

    prepared.bind("age", 12);
    let rows = prepared.execute().unwrap();
    assert!(rows.is_empty());
    assert_eq!(backend.calls.get(), 1);

    let delete = backend.last_delete.borrow().clone().expect("delete call");
    assert_eq!(delete.entity, "X");
    assert_eq!(
        delete.condition,
        Some(Condition::eq(Column::new("age", 12i64)))
    );
}

#[test]
fn unbound_parameters_never_reach_backend() {
    let engine = QueryEngine::new();
    let backend = Capture::default();
    let mut prepared = engine
        .prepare("select * from God where name = @name and age > @age", &backend)
        .unwrap();
    prepared.bind("name", "Diana");

    match prepared.result_list() {
        Err(QueryError::UnboundParameters { names }) => assert_eq!(names, vec!["age"]),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(backend.calls.get(), 0);
    assert_eq!(prepared.unbound(), vec!["age"]);
}

#[test]
fn undeclared_names_are_ignored_and_rebinding_overwrites() {
    let engine = QueryEngine::new();
    let backend = Capture::default();
    let mut prepared = engine
        .prepare("select * from God where name = @name", &backend)
        .unwrap();
    prepared
        .bind("nickname", "Di")
        .bind("name", "Ares")
        .bind("name", "Diana");
    assert_eq!(prepared.params(), ["name".to_owned()]);

    prepared.execute().unwrap();
    let select = backend.last_select.borrow().clone().expect("select call");
    assert_eq!(
        select.condition,
        Some(Condition::eq(Column::new("name", "Diana")))
    );
}

#[test]
fn repeated_placeholder_is_declared_once() {
    let engine = QueryEngine::new();
    let backend = Capture::default();
    let mut prepared = engine
        .prepare("select * from God where a = @v or b = @v", &backend)
        .unwrap();
    assert_eq!(prepared.params().len(), 1);
    prepared.bind("v", true);
    let Statement::Select(select) = prepared.statement().unwrap() else {
        panic!("expected select");
    };
    assert_eq!(
        select.condition,
        Some(Condition::Or(vec![
            Condition::eq(Column::new("a", true)),
            Condition::eq(Column::new("b", true)),
        ]))
    );
}

#[test]
fn in_placeholder_accepts_lists_and_scalars() {
    let engine = QueryEngine::new();
    let backend = Capture::default();
    let mut prepared = engine
        .prepare("select * from God where name in @names", &backend)
        .unwrap();

    prepared.bind("names", vec!["Diana", "Ares"]);
    prepared.execute().unwrap();
    let select = backend.last_select.borrow().clone().expect("select call");
    assert_eq!(
        select.condition.as_ref().and_then(Condition::column).map(|c| &c.value),
        Some(&Value::List(vec!["Diana".into(), "Ares".into()]))
    );

    prepared.bind("names", "Zeus");
    prepared.execute().unwrap();
    let select = backend.last_select.borrow().clone().expect("select call");
    assert_eq!(
        select.condition.as_ref().and_then(Condition::column).map(|c| &c.value),
        Some(&Value::List(vec!["Zeus".into()]))
    );
}

#[test]
fn single_result_shapes() {
    let engine = QueryEngine::new();
    let query = "select * from God where name = @name";

    let empty = Capture::default();
    let mut prepared = engine.prepare(query, &empty).unwrap();
    prepared.bind("name", "Diana");
    assert_eq!(prepared.single_result().unwrap(), None);

    let one = Capture::serving(vec![god("Diana")]);
    let mut prepared = engine.prepare(query, &one).unwrap();
    prepared.bind("name", "Diana");
    assert_eq!(prepared.single_result().unwrap(), Some(god("Diana")));

    let two = Capture::serving(vec![god("Diana"), god("Diana")]);
    let mut prepared = engine.prepare(query, &two).unwrap();
    prepared.bind("name", "Diana");
    assert_eq!(
        prepared.single_result().unwrap_err(),
        QueryError::NonUniqueResult { count: 2 }
    );
}

#[test]
fn clones_bind_independently() {
    let engine = QueryEngine::new();
    let backend = MemoryBackend::new();
    for name in ["Diana", "Ares"] {
        engine
            .query(&format!("insert God (name = '{name}')"), &backend)
            .unwrap();
    }

    let template = engine
        .prepare("select * from God where name = @name", &backend)
        .unwrap();
    let mut diana = template.clone();
    let mut ares = template.clone();
    diana.bind("name", "Diana");
    ares.bind("name", "Ares");

    assert_eq!(diana.result_list().unwrap(), vec![god("Diana")]);
    assert_eq!(ares.result_list().unwrap(), vec![god("Ares")]);
    assert_eq!(template.unbound(), vec!["name"]);
}

#[test]
fn parameterized_insert_binds_columns() {
    let engine = QueryEngine::new();
    let backend = MemoryBackend::new();
    let mut prepared = engine
        .prepare("insert God (name = @name, age = @age) 1 day", &backend)
        .unwrap();
    prepared.bind("name", "Diana").bind("age", 10);
    let rows = prepared.execute().unwrap();
    assert_eq!(rows, vec![god("Diana").with("age", 10i64)]);
    assert_eq!(backend.ttls("God"), vec![Some(Duration::from_secs(86_400))]);
}

#[test]
fn async_execution_reports_through_callback() {
    let engine = QueryEngine::new();
    let backend = MemoryBackend::new();
    engine.query("insert God (name = 'Diana')", &backend).unwrap();

    let mut prepared = engine
        .prepare("select * from God where name = @name", &backend)
        .unwrap();

    let (tx, rx) = mpsc::channel();
    let unbound_tx = tx.clone();
    prepared.execute_async(Box::new(move |result| {
        unbound_tx.send(result).unwrap();
    }));
    assert!(matches!(
        rx.recv().unwrap(),
        Err(QueryError::UnboundParameters { .. })
    ));

    prepared.bind("name", "Diana");
    prepared.execute_async(Box::new(move |result| {
        tx.send(result).unwrap();
    }));
    assert_eq!(rx.recv().unwrap().unwrap(), vec![god("Diana")]);
}
