//! End-to-end tests: caller options through the entity service against a
//! seeded in-memory SQLite database.

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde_json::{Value as JsonValue, json};

use entity_query::db::Database;
use entity_query::entities::{category, product, user};
use entity_query::orm::{EntitySchema, Record, SqliteStore};
use entity_query::query::{EntityQueryOptions, PaginationMeta, Predicate, Scalar};
use entity_query::services::{Actor, DeleteOutcome, EntityService, FindAllResult, ServiceConfig};
use entity_query::EntityError;

async fn service(schema: &'static EntitySchema) -> EntityService<SqliteStore> {
    let db = Database::connect("sqlite::memory:", 1).await.unwrap();
    db.bootstrap(true).await.unwrap();
    EntityService::new(db.store(), schema, ServiceConfig::default()).unwrap()
}

fn options(json: JsonValue) -> EntityQueryOptions {
    EntityQueryOptions::from_json(&json).unwrap()
}

fn record(json: JsonValue) -> Record {
    json.as_object().cloned().unwrap()
}

fn ids(records: &[Record]) -> Vec<i64> {
    records.iter().map(|r| r["id"].as_i64().unwrap()).collect()
}

fn sorted_ids(records: &[Record]) -> Vec<i64> {
    let mut ids = ids(records);
    ids.sort();
    ids
}

#[tokio::test]
async fn test_find_all_without_pagination_is_a_bare_list() {
    let svc = service(product::schema()).await;
    let result = svc.find_all(&EntityQueryOptions::default()).await.unwrap();

    assert_matches!(&result, FindAllResult::List(records) if records.len() == 7);
    let json = serde_json::to_value(&result).unwrap();
    assert!(json.is_array());
}

#[tokio::test]
async fn test_find_all_paginated() {
    let svc = service(product::schema()).await;
    let result = svc
        .find_all(&options(json!({"page": 2, "pageSize": 3})))
        .await
        .unwrap();

    assert_eq!(ids(result.records()), vec![4, 5, 6]);
    assert_eq!(
        result.meta(),
        Some(PaginationMeta {
            total: 7,
            page_count: 3,
            page: 2
        })
    );

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["meta"], json!({"total": 7, "pageCount": 3, "page": 2}));
    assert_eq!(json["records"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn test_page_past_the_end_is_empty_with_total() {
    let svc = service(product::schema()).await;
    let result = svc
        .find_all(&options(json!({"page": 9, "pageSize": 5})))
        .await
        .unwrap();
    assert!(result.records().is_empty());
    assert_eq!(result.meta().map(|m| m.total), Some(7));
}

#[tokio::test]
async fn test_absurd_page_number_is_empty_not_an_overflow() {
    let svc = service(product::schema()).await;
    let result = svc
        .find_all(&options(json!({"page": i64::MAX, "pageSize": 10})))
        .await
        .unwrap();
    assert!(result.records().is_empty());
    assert_eq!(result.meta().map(|m| m.total), Some(7));
}

#[tokio::test]
async fn test_search_operators() {
    let svc = service(product::schema()).await;

    let cases = [
        (json!({"name": {"like": "CHEESE"}}), vec![2]),
        (json!({"name": {"startsWith": "b"}}), vec![5]),
        (json!({"price": {"gte": 100, "lte": 300}}), vec![3, 5, 6]),
        (json!({"price": {"gt": 500}}), vec![7]),
        (json!({"inStock": false}), vec![3, 6]),
        (json!({"description": {"isNull": true}}), vec![3, 6]),
        (json!({"categoryId": {"in": [1, 3]}}), vec![1, 4, 5, 6]),
        (json!({"createdAt": {"from": "2024-03-01T00:00:00.000Z"}}), vec![5, 6, 7]),
        (json!({"or": [{"id": 1}, {"name": "Gift card"}]}), vec![1, 7]),
        (
            json!({"and": [{"not": {"categoryId": {"isNull": true}}}, {"price": {"lt": 100}}]}),
            vec![1, 4],
        ),
        (json!({"category": {"name": "Cheese"}}), vec![2, 3]),
        (json!({"category": {"parent": {"name": "Dairy"}}}), vec![2, 3]),
    ];

    for (search, expected) in cases {
        let result = svc
            .find_all(&options(json!({ "search": search.clone() })))
            .await
            .unwrap();
        assert_eq!(sorted_ids(result.records()), expected, "search {search}");
    }
}

#[tokio::test]
async fn test_sort() {
    let svc = service(product::schema()).await;

    let result = svc
        .find_all(&options(json!({"sort": {"price": "DESC"}})))
        .await
        .unwrap();
    assert_eq!(ids(result.records()), vec![7, 2, 3, 5, 6, 1, 4]);

    let result = svc
        .find_all(&options(json!({"sort": {"category.name": "DESC", "id": "ASC"}, "pageSize": 2})))
        .await
        .unwrap();
    assert_eq!(ids(result.records()), vec![1, 5]);
}

#[tokio::test]
async fn test_relations_are_attached() {
    let svc = service(product::schema()).await;
    let result = svc
        .find_all(&options(json!({
            "relations": "category.parent, creator",
            "sort": {"id": "ASC"}
        })))
        .await
        .unwrap();
    let records = result.records();

    assert_eq!(
        records[1]["category"],
        json!({
            "id": 2,
            "name": "Cheese",
            "parentId": 1,
            "parent": {"id": 1, "name": "Dairy", "parentId": null}
        })
    );
    assert_eq!(records[6]["category"], JsonValue::Null);

    let creator = records[0]["creator"].as_object().unwrap();
    assert_eq!(creator["email"], json!("admin@shop.test"));
    assert!(!creator.contains_key("password"));
}

#[tokio::test]
async fn test_has_many_relation() {
    let svc = service(category::schema()).await;
    let found = svc
        .find_one(Scalar::Int(3), &options(json!({"relations": ["products"]})))
        .await
        .unwrap();

    let names: Vec<&str> = found["products"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Rye bread", "Croissant"]);
}

#[tokio::test]
async fn test_exclude_fields_and_relations() {
    let svc = service(product::schema()).await;
    let found = svc
        .find_one(
            Scalar::Int(2),
            &options(json!({
                "relations": "category.parent,creator",
                "exclude": "description,category.parentId,creator"
            })),
        )
        .await
        .unwrap();

    assert!(!found.contains_key("description"));
    assert!(!found.contains_key("creator"));
    let category = found["category"].as_object().unwrap();
    assert!(!category.contains_key("parentId"));
    // the join key is fetched internally but never returned
    assert_eq!(category["parent"]["name"], json!("Dairy"));
}

#[tokio::test]
async fn test_query_string_end_to_end() {
    let svc = service(product::schema()).await;
    let options = EntityQueryOptions::from_query_str(
        "search[name][like]=bread&search[inStock]=true&relations=category&page=1&pageSize=5",
    )
    .unwrap();

    let result = svc.find_all(&options).await.unwrap();
    assert_eq!(ids(result.records()), vec![4]);
    assert_eq!(result.records()[0]["category"]["name"], json!("Bakery"));
    assert_eq!(result.meta().map(|m| m.page_count), Some(1));
}

#[tokio::test]
async fn test_query_string_lists_follow_indices_and_normalize() {
    let svc = service(product::schema()).await;

    for query in [
        "search[or][1][name]=Gift%20card&search[or][0][id]=1",
        "search[or][0][id]=1&search[or][1][name]=Gift%20card",
    ] {
        let options = EntityQueryOptions::from_query_str(query).unwrap();
        let result = svc.find_all(&options).await.unwrap();
        assert_eq!(sorted_ids(result.records()), vec![1, 7], "query {query}");
    }

    for query in [
        "search[or][0][inStock]=false",
        "search[or][0][description][isNull]=true",
    ] {
        let options = EntityQueryOptions::from_query_str(query).unwrap();
        let result = svc.find_all(&options).await.unwrap();
        assert_eq!(sorted_ids(result.records()), vec![3, 6], "query {query}");
    }
}

#[tokio::test]
async fn test_like_folds_non_ascii_case() {
    let svc = service(product::schema()).await;
    svc.create_one(
        record(json!({"name": "Сыр Российский", "price": 450, "categoryId": 2})),
        None,
    )
    .await
    .unwrap();

    for search in [
        json!({"name": {"like": "сыр"}}),
        json!({"name": {"startsWith": "СЫР"}}),
        json!({"name": {"endsWith": "российский"}}),
    ] {
        let result = svc
            .find_all(&options(json!({ "search": search.clone() })))
            .await
            .unwrap();
        assert_eq!(ids(result.records()), vec![8], "search {search}");
    }
}

#[tokio::test]
async fn test_identity_is_combined_with_search() {
    let svc = service(product::schema()).await;
    let err = svc
        .find_one(Scalar::Int(1), &options(json!({"search": {"name": "Butter"}})))
        .await;
    assert_matches!(err, Err(EntityError::NotFound { entity: "Product", .. }));

    let found = svc
        .find_one(Scalar::Int(5), &options(json!({"search": {"name": "Butter"}})))
        .await
        .unwrap();
    assert_eq!(found["id"], json!(5));
}

#[tokio::test]
async fn test_find_one_by_trusted_predicate() {
    let svc = service(user::schema()).await;

    let admin = svc
        .find_one_by(
            Predicate::eq("email", Scalar::from("admin@shop.test")),
            &EntityQueryOptions::default(),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(admin["role"], json!("admin"));
    assert!(!admin.contains_key("password"));

    let nobody = svc
        .find_one_by(
            Predicate::eq("email", Scalar::from("ghost@shop.test")),
            &EntityQueryOptions::default(),
        )
        .await
        .unwrap();
    assert!(nobody.is_none());
}

#[tokio::test]
async fn test_create_update_soft_delete_lifecycle() {
    let svc = service(product::schema()).await;
    let actor = Actor::new(2);

    let created = svc
        .create_one(
            record(json!({"name": "Kefir", "price": 99.5, "categoryId": 1})),
            Some(&actor),
        )
        .await
        .unwrap();
    assert_eq!(created["id"], json!(8));
    assert_eq!(created["createdBy"], json!(2));
    assert_eq!(created["inStock"], json!(true));
    assert_eq!(created["deletedAt"], JsonValue::Null);

    let updated = svc
        .update_one(Scalar::Int(8), record(json!({"price": 105})), Some(&Actor::new(1)))
        .await
        .unwrap();
    assert_eq!(updated["price"], json!(105.0));
    assert_eq!(updated["name"], json!("Kefir"));
    assert_eq!(updated["createdBy"], json!(2));
    assert_eq!(updated["updatedBy"], json!(1));

    let outcome = svc.delete_one(Scalar::Int(8), None).await.unwrap();
    assert_matches!(outcome, DeleteOutcome::SoftDeleted(ref r) if r["deletedAt"].is_string());

    assert_matches!(
        svc.find_one(Scalar::Int(8), &EntityQueryOptions::default()).await,
        Err(EntityError::NotFound { .. })
    );
    assert_matches!(
        svc.update_one(Scalar::Int(8), record(json!({"price": 1})), None).await,
        Err(EntityError::NotFound { .. })
    );
    assert_matches!(
        svc.delete_one(Scalar::Int(8), None).await,
        Err(EntityError::NotFound { .. })
    );

    let all = svc
        .find_all(&options(json!({"pageSize": 100})))
        .await
        .unwrap();
    assert_eq!(all.meta().map(|m| m.total), Some(7));
}

#[tokio::test]
async fn test_soft_deleted_relations_are_hidden() {
    let products = service(product::schema()).await;
    products.delete_one(Scalar::Int(4), None).await.unwrap();

    let categories =
        EntityService::new(products.store().clone(), category::schema(), ServiceConfig::default())
            .unwrap();
    let bakery = categories
        .find_one(Scalar::Int(3), &options(json!({"relations": "products"})))
        .await
        .unwrap();
    assert_eq!(bakery["products"].as_array().map(Vec::len), Some(1));

    let matched = categories
        .find_all(&options(json!({"search": {"products": {"name": "Rye bread"}}})))
        .await
        .unwrap();
    assert!(matched.records().is_empty());
}

#[tokio::test]
async fn test_hard_delete() {
    let svc = service(category::schema()).await;

    let outcome = svc.delete_one(Scalar::Int(3), None).await.unwrap();
    assert_eq!(outcome, DeleteOutcome::Removed { affected: 1 });
    assert_matches!(
        svc.find_one(Scalar::Int(3), &EntityQueryOptions::default()).await,
        Err(EntityError::NotFound { .. })
    );
}

#[tokio::test]
async fn test_malformed_requests() {
    let products = service(product::schema()).await;
    for json in [
        json!({"search": {"colour": "red"}}),
        json!({"search": {"category": 1}}),
        json!({"sort": {"colour": "ASC"}}),
        json!({"sort": {"creator.password": "ASC"}}),
        json!({"relations": "supplier"}),
        json!({"relations": "category.owner"}),
    ] {
        let result = products.find_all(&options(json.clone())).await;
        assert_matches!(result, Err(EntityError::MalformedInput(_)), "options {json}");
    }

    assert_matches!(
        EntityQueryOptions::from_query_str("search={broken"),
        Err(EntityError::MalformedInput(_))
    );
    assert_matches!(
        EntityQueryOptions::from_query_str("page=first"),
        Err(EntityError::MalformedInput(_))
    );

    let users = service(user::schema()).await;
    assert_matches!(
        users.find_all(&options(json!({"sort": {"password": "ASC"}}))).await,
        Err(EntityError::MalformedInput(_))
    );
}
