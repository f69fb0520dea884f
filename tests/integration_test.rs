//! End-to-end scenarios: build, query, persist, reload.

mod common;

use annforest::{
    ForestError, ForestIndex, ForestParams, Metric, Query, SearchParams, Vector,
};
use approx::assert_relative_eq;
use tempfile::TempDir;

#[test]
fn test_orthogonal_pairs() {
    let items = vec![
        ("a1", Vector::new(vec![1.0, 0.0, 0.0, 0.0])),
        ("b1", Vector::new(vec![0.0, 0.0, 1.0, 0.0])),
        ("a2", Vector::new(vec![0.99, 0.01, 0.0, 0.0])),
        ("b2", Vector::new(vec![0.0, 0.0, 1.0, 0.0])),
    ];
    let index = ForestIndex::build(items, ForestParams::new(1, 2, 3)).unwrap();
    let search = SearchParams::default();

    let a = index.recommend("a1", 1, &search).unwrap();
    assert_eq!(a.len(), 1);
    assert_eq!(a[0].item_id, "a2");
    assert!(a[0].distance < 0.05);

    let b = index.recommend("b1", 1, &search).unwrap();
    assert_eq!(b[0].item_id, "b2");
    assert_relative_eq!(b[0].distance, 0.0, epsilon = 1e-6);
}

#[test]
fn test_identical_vectors_are_reachable() {
    let items = vec![
        ("x", Vector::new(vec![0.5, 0.5, 0.5])),
        ("y", Vector::new(vec![0.5, 0.5, 0.5])),
    ];
    let index = ForestIndex::build(items, ForestParams::new(3, 1, 0)).unwrap();
    let search = SearchParams::default();

    let from_x = index.recommend("x", 1, &search).unwrap();
    assert_eq!(from_x[0].item_id, "y");
    let from_y = index.recommend("y", 1, &search).unwrap();
    assert_eq!(from_y[0].item_id, "x");
}

#[test]
fn test_many_duplicates_terminate_and_stay_reachable() {
    let mut items: Vec<(String, Vector)> = (0..50)
        .map(|i| (format!("dup{}", i), Vector::new(vec![1.0, 2.0])))
        .collect();
    items.push(("other".to_string(), Vector::new(vec![-2.0, 1.0])));

    let index = ForestIndex::build(items, ForestParams::new(2, 3, 17)).unwrap();
    let results = index
        .query(Query::Item("other"), 50, &SearchParams::exhaustive())
        .unwrap();
    assert_eq!(results.len(), 50);
    assert!(results.iter().all(|n| n.item_id.starts_with("dup")));
}

#[test]
fn test_unknown_identifier() {
    let index = ForestIndex::build(common::random_vectors(20, 4, 1), ForestParams::default())
        .unwrap();
    let err = index
        .recommend("not-in-catalog", 5, &SearchParams::default())
        .unwrap_err();
    assert!(matches!(err, ForestError::UnknownIdentifier { ref id } if id == "not-in-catalog"));
    assert!(err.is_not_found());
}

#[test]
fn test_k_larger_than_store() {
    let index = ForestIndex::build(common::random_vectors(9, 3, 2), ForestParams::new(2, 2, 2))
        .unwrap();
    let results = index
        .recommend("item4", 100, &SearchParams::default())
        .unwrap();
    assert_eq!(results.len(), 8);
}

#[test]
fn test_single_item_store() {
    let index = ForestIndex::build(
        vec![("only", Vector::new(vec![1.0, 1.0]))],
        ForestParams::default(),
    )
    .unwrap();
    let results = index.recommend("only", 3, &SearchParams::default()).unwrap();
    assert!(results.is_empty());
}

#[test]
fn test_build_errors() {
    let mismatch = vec![
        ("a", Vector::new(vec![1.0, 2.0])),
        ("b", Vector::new(vec![1.0])),
    ];
    assert!(matches!(
        ForestIndex::build(mismatch, ForestParams::default()),
        Err(ForestError::DimensionMismatch { .. })
    ));

    let duplicate = vec![
        ("a", Vector::new(vec![1.0, 2.0])),
        ("a", Vector::new(vec![2.0, 1.0])),
    ];
    assert!(matches!(
        ForestIndex::build(duplicate, ForestParams::default()),
        Err(ForestError::DuplicateIdentifier { .. })
    ));

    let zero = vec![("z", Vector::new(vec![0.0, 0.0]))];
    assert!(matches!(
        ForestIndex::build(zero, ForestParams::default()),
        Err(ForestError::DegenerateVector { .. })
    ));
}

#[test]
fn test_external_vector_query_errors() {
    let index = ForestIndex::build(common::random_vectors(10, 3, 5), ForestParams::default())
        .unwrap();
    let search = SearchParams::default();

    assert!(matches!(
        index.query(Query::Vector(&[1.0, 2.0]), 3, &search),
        Err(ForestError::DimensionMismatch { expected: 3, actual: 2 })
    ));
    assert!(matches!(
        index.query(Query::Vector(&[0.0, 0.0, 0.0]), 3, &search),
        Err(ForestError::DegenerateVector { .. })
    ));
    assert!(matches!(
        index.query(Query::Vector(&[1.0, 0.0, 0.0]), 0, &search),
        Err(ForestError::InvalidK { k: 0 })
    ));
}

#[test]
fn test_euclidean_forest() {
    let items: Vec<(String, Vector)> = (0..100)
        .map(|i| (format!("p{}", i), Vector::new(vec![i as f32, 0.0])))
        .collect();
    let params = ForestParams::new(4, 4, 8).with_metric(Metric::Euclidean);
    let index = ForestIndex::build(items, params).unwrap();

    let results = index.recommend("p50", 2, &SearchParams::default()).unwrap();
    let mut ids: Vec<&str> = results.iter().map(|n| n.item_id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["p49", "p51"]);
    assert_relative_eq!(results[0].distance, 1.0, epsilon = 1e-5);
}

#[test]
fn test_persisted_output_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let params = ForestParams::new(5, 8, 2024);

    let first = dir.path().join("first.afi");
    let second = dir.path().join("second.afi");
    ForestIndex::build(common::random_vectors(300, 16, 9), params)
        .unwrap()
        .save(&first)
        .unwrap();
    ForestIndex::build(common::random_vectors(300, 16, 9), params)
        .unwrap()
        .save(&second)
        .unwrap();

    assert_eq!(std::fs::read(&first).unwrap(), std::fs::read(&second).unwrap());
}

#[test]
fn test_reload_answers_identically() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("items.afi");
    let index = ForestIndex::build(
        common::random_vectors(500, 24, 4),
        ForestParams::new(6, 10, 31),
    )
    .unwrap();
    index.save(&path).unwrap();
    let loaded = ForestIndex::load(&path).unwrap();

    for budget_factor in [1, 3, 20] {
        let search = SearchParams::new(budget_factor).unwrap();
        for slot in [0u32, 123, 499] {
            assert_eq!(
                index.query(Query::Slot(slot), 10, &search).unwrap(),
                loaded.query(Query::Slot(slot), 10, &search).unwrap()
            );
        }
        let probe = vec![0.25f32; 24];
        assert_eq!(
            index.query(Query::Vector(&probe), 7, &search).unwrap(),
            loaded.query(Query::Vector(&probe), 7, &search).unwrap()
        );
    }
}

#[test]
fn test_angular_ranking_ignores_magnitude() {
    let items = vec![
        ("tiny", Vector::new(vec![1e-30, 1e-30])),
        ("b", Vector::new(vec![1.0, 1.0])),
        ("c", Vector::new(vec![1.0, 0.0])),
        ("big", Vector::new(vec![1e20, 1e20])),
    ];
    let index = ForestIndex::build(items, ForestParams::default()).unwrap();
    let results = index.recommend("c", 3, &SearchParams::default()).unwrap();

    assert_eq!(results.len(), 3);
    for n in &results {
        assert_relative_eq!(n.distance, 0.765367, epsilon = 1e-5);
    }
    let mut ids: Vec<&str> = results.iter().map(|n| n.item_id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["b", "big", "tiny"]);
}
