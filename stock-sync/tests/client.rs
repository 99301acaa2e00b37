use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::json;
use stock_sync::api::constants::entity_sets;
use stock_sync::api::query::fetchxml;
use stock_sync::api::{CrmError, DynamicsClient, StaticTokenProvider};
use stock_sync::entities::{Product, ProductPriceLevel};
use uuid::Uuid;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API: &str = "/api/data/v9.2";

fn client(server: &MockServer) -> DynamicsClient {
    DynamicsClient::new(
        format!("{}{}", server.uri(), API),
        Arc::new(StaticTokenProvider::new("test-token")),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn set_path(set: &str) -> String {
    format!("{}/{}", API, set)
}

fn record_path(set: &str, id: Uuid) -> String {
    format!("{}/{}({})", API, set, id)
}

#[tokio::test]
async fn test_fetchxml_query_without_matches_returns_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(set_path(entity_sets::PRODUCTS)))
        .and(header("Authorization", "Bearer test-token"))
        .and(header("OData-Version", "4.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let query = fetchxml::product_by_number("STK-001", &[]);
    let product = client(&server)
        .get_by_fetchxml::<Product>(entity_sets::PRODUCTS, &query)
        .await
        .unwrap();

    assert_eq!(product, None);
}

#[tokio::test]
async fn test_fetchxml_with_reserved_characters_arrives_well_formed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(set_path(entity_sets::PRODUCTS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .expect(4)
        .mount(&server)
        .await;

    let codes = ["A&B", "O'NEIL", "X<1", "50% OFF+/#1"];
    let client = client(&server);
    for code in codes {
        let query = fetchxml::product_by_number(code, &[]);
        client
            .get_by_fetchxml::<Product>(entity_sets::PRODUCTS, &query)
            .await
            .unwrap();
    }

    let requests = server.received_requests().await.unwrap();
    let received: Vec<String> = requests
        .iter()
        .map(|request| {
            let fetch_xml = request
                .url
                .query_pairs()
                .find(|(key, _)| key == "fetchXml")
                .map(|(_, value)| value.into_owned())
                .unwrap();
            let doc = roxmltree::Document::parse(&fetch_xml).unwrap();
            doc.descendants()
                .find(|n| n.has_tag_name("condition"))
                .and_then(|n| n.attribute("value"))
                .unwrap()
                .to_string()
        })
        .collect();

    assert_eq!(received, codes);
}

#[tokio::test]
async fn test_fetchxml_query_returns_first_record_with_lookups() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    let uom = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path(set_path(entity_sets::PRODUCTS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "@odata.context": "$metadata#products",
            "value": [
                { "productid": id, "productnumber": "STK-001", "_defaultuomid_value": uom },
                { "productid": Uuid::new_v4(), "productnumber": "STK-001" }
            ]
        })))
        .mount(&server)
        .await;

    let query = fetchxml::product_by_number("STK-001", &[]);
    let product = client(&server)
        .get_by_fetchxml::<Product>(entity_sets::PRODUCTS, &query)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(product.id, Some(id));
    assert_eq!(product.default_uom_id, Some(uom));
}

#[tokio::test]
async fn test_get_all_by_fetchxml_returns_every_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(set_path(entity_sets::PRODUCT_PRICE_LEVELS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                { "productpricelevelid": Uuid::new_v4(), "amount": 1.5 },
                { "productpricelevelid": Uuid::new_v4(), "amount": 2.25 }
            ]
        })))
        .mount(&server)
        .await;

    let query = fetchxml::price_level_by_product(Uuid::new_v4(), Uuid::new_v4(), &[]);
    let records = client(&server)
        .get_all_by_fetchxml::<ProductPriceLevel>(entity_sets::PRODUCT_PRICE_LEVELS, &query)
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[1].amount, Some(Decimal::new(225, 2)));
}

#[tokio::test]
async fn test_rejected_request_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(set_path(entity_sets::PRODUCTS)))
        .respond_with(ResponseTemplate::new(400).set_body_string("{\"error\":\"bad fetch\"}"))
        .mount(&server)
        .await;

    let query = fetchxml::product_by_number("STK-001", &[]);
    let err = client(&server)
        .get_by_fetchxml::<Product>(entity_sets::PRODUCTS, &query)
        .await
        .unwrap_err();

    match err {
        CrmError::Rejected { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("bad fetch"));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_get_by_id_selects_columns() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path(record_path(entity_sets::PRODUCTS, id)))
        .and(query_param("$select", "name,productnumber"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "productid": id,
            "name": "Pump",
            "productnumber": "STK-001"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let product: Product = client(&server)
        .get(entity_sets::PRODUCTS, id, &["name", "productnumber"])
        .await
        .unwrap();

    assert_eq!(product.name.as_deref(), Some("Pump"));
}

#[tokio::test]
async fn test_create_returns_id_from_entity_id_header() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    let uom = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path(set_path(entity_sets::PRODUCTS)))
        .and(body_json(json!({
            "productnumber": "STK-001",
            "defaultuomid@odata.bind": format!("/uoms({})", uom)
        })))
        .respond_with(ResponseTemplate::new(204).insert_header(
            "OData-EntityId",
            format!("https://contoso.crm.dynamics.com{}", record_path(entity_sets::PRODUCTS, id)),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let product = Product {
        product_number: Some("STK-001".to_string()),
        default_uom_id: Some(uom),
        ..Default::default()
    };
    let created = client(&server)
        .create(entity_sets::PRODUCTS, &product)
        .await
        .unwrap();

    assert_eq!(created, id);
}

#[tokio::test]
async fn test_create_without_parseable_id_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(set_path(entity_sets::PRODUCTS)))
        .respond_with(
            ResponseTemplate::new(204).insert_header("OData-EntityId", "https://contoso/products"),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .create(entity_sets::PRODUCTS, &Product::default())
        .await
        .unwrap_err();

    assert!(matches!(err, CrmError::Protocol(_)));
}

#[tokio::test]
async fn test_update_patches_record_with_if_match() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("PATCH"))
        .and(path(record_path(entity_sets::PRODUCTS, id)))
        .and(header("If-Match", "*"))
        .and(body_json(json!({ "statecode": 0, "statuscode": 1 })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let updated = client(&server)
        .update(entity_sets::PRODUCTS, &Product::activation(), id)
        .await
        .unwrap();

    assert_eq!(updated, id);
}

#[tokio::test]
async fn test_delete_record() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("DELETE"))
        .and(path(record_path(entity_sets::PRODUCT_PRICE_LEVELS, id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .delete::<ProductPriceLevel>(entity_sets::PRODUCT_PRICE_LEVELS, id)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_missing_record_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let err = client(&server)
        .delete::<Product>(entity_sets::PRODUCTS, Uuid::new_v4())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "remote_rejected");
}
