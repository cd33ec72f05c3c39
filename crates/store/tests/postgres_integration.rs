//! Integration tests for the Postgres repository using testcontainers.

use orders::{
    ActorId, AffiliateId, ApprovalAction, ApprovalStatus, ChannelKind, InfoField, InfoRequest,
    LinkMeDetails, Money, Order, OrderFilter, OrderId, OrderLine, OrderReference, OrderRepository,
    Quantity, Rate, RepositoryError, StatusChange, Timestamp,
};
use rust_decimal::Decimal;
use store::PgOrderRepository;
use testcontainers::{runners::AsyncRunner, ImageExt};
use testcontainers_modules::postgres::Postgres;

async fn start() -> (testcontainers::ContainerAsync<Postgres>, PgOrderRepository) {
    let (container, repo, _) = start_with_url().await;
    (container, repo)
}

async fn start_with_url() -> (testcontainers::ContainerAsync<Postgres>, PgOrderRepository, String) {
    let container = Postgres::default()
        .with_tag("16")
        .start()
        .await
        .expect("Failed to start Postgres container");
    let host = container.get_host().await.unwrap();
    let port = container.get_host_port_ipv4(5432).await.unwrap();
    let url = format!("host={host} port={port} user=postgres password=postgres dbname=postgres");

    let repo = PgOrderRepository::connect(&url, 4).await.unwrap();
    let applied = repo.migrate().await.unwrap();
    assert_eq!(applied, vec!["0001", "0002"]);
    (container, repo, url)
}

fn order(reference: &str) -> Order {
    let now = Timestamp::now();
    Order {
        id: OrderId::new_random(),
        reference: OrderReference::new(reference).unwrap(),
        organisation_id: None,
        created_by_affiliate_id: Some(AffiliateId::new_random()),
        linkme_selection_id: None,
        status: ApprovalStatus::PendingAdminValidation,
        lines: vec![
            OrderLine {
                product_id: None,
                product_name: "Fauteuil Milo".into(),
                quantity: Quantity::new(3).unwrap(),
                unit_price: Money::new(Decimal::new(12353, 2)).unwrap(),
                base_price: Money::new(Decimal::new(10000, 2)).unwrap(),
                margin_rate: Rate::new(Decimal::new(15, 2)).unwrap(),
                commission_rate: Rate::new(Decimal::new(5, 2)).unwrap(),
            },
            OrderLine {
                product_id: None,
                product_name: "Coussin".into(),
                quantity: Quantity::new(1).unwrap(),
                unit_price: Money::new(Decimal::new(2221, 2)).unwrap(),
                base_price: Money::new(Decimal::new(2000, 2)).unwrap(),
                margin_rate: Rate::new(Decimal::new(10, 2)).unwrap(),
                commission_rate: Rate::ZERO,
            },
        ],
        shipping_cost_ht: Money::from_cents(2500),
        vat_rate: Rate::new(Decimal::new(20, 2)).unwrap(),
        details: LinkMeDetails::default(),
        info_request: None,
        rejection_reason: None,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn orders_round_trip_with_lines_in_order() {
    let (_container, repo) = start().await;
    let o = order("LM-2026-00001");
    repo.insert(&o).await.unwrap();

    let stored = repo.get(o.id).await.unwrap().unwrap();
    assert_eq!(stored.reference, o.reference);
    assert_eq!(stored.lines, o.lines);
    assert_eq!(stored.totals().unwrap(), o.totals().unwrap());

    let err = repo.insert(&order("LM-2026-00001")).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Duplicate(_)));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn list_filters_by_status_and_channel() {
    let (_container, repo) = start().await;
    let affiliate = order("LM-A");
    let mut manual = order("LM-M");
    manual.created_by_affiliate_id = None;
    repo.insert(&affiliate).await.unwrap();
    repo.insert(&manual).await.unwrap();

    let found = repo
        .list(&OrderFilter {
            status: Some(ApprovalStatus::PendingAdminValidation),
            channel: Some(ChannelKind::Manual),
            limit: None,
        })
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, manual.id);

    let approved = repo
        .list(&OrderFilter {
            status: Some(ApprovalStatus::Approved),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(approved.is_empty());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn transitions_are_compare_and_set_and_recorded() {
    let (_container, repo) = start().await;
    let o = order("LM-T");
    repo.insert(&o).await.unwrap();

    let now = Timestamp::now();
    let (token, request) = InfoRequest::issue(
        [InfoField::DeliveryCity],
        Some("Ville de livraison ?".into()),
        ActorId::new("ops").unwrap(),
        now,
        chrono::Duration::days(30),
    )
    .unwrap();
    let change = StatusChange::new(
        o.id,
        o.status,
        ApprovalAction::RequestInfo,
        ActorId::new("ops"),
        None,
        now,
    )
    .unwrap();
    let mut updated = o.clone();
    updated.status = change.to;
    updated.info_request = Some(request.clone());
    repo.record_transition(&change, &updated).await.unwrap();

    let err = repo.record_transition(&change, &updated).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict { .. }));

    let found = repo.find_by_info_token(&token.hash()).await.unwrap().unwrap();
    assert_eq!(found.status, ApprovalStatus::InfoRequested);
    assert_eq!(found.info_request, Some(request));

    let history = repo.history(o.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, ApprovalAction::RequestInfo);
    assert_eq!(history[0].actor, ActorId::new("ops"));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn repository_survives_terminated_connections() {
    let (_container, repo, url) = start_with_url().await;
    let o = order("LM-PG-9");
    repo.insert(&o).await.unwrap();

    let (admin, connection) = tokio_postgres::connect(&url, tokio_postgres::NoTls)
        .await
        .unwrap();
    tokio::spawn(connection);
    let killed = admin
        .query(
            "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
             WHERE pid <> pg_backend_pid() AND datname = current_database()",
            &[],
        )
        .await
        .unwrap();
    assert!(!killed.is_empty());
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let stored = repo.get(o.id).await.unwrap().expect("order still readable");
    assert_eq!(stored.reference, o.reference);
}
