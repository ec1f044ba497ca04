//! Live integration tests for geocrm-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. They need `DATABASE_URL` and are ignored by default;
//! run them with `cargo test -p geocrm-db -- --ignored`.

use chrono::{Duration, Utc};
use geocrm_core::EquipmentItem;
use geocrm_db::{
    clear_sync_cursor, clear_sync_pause, create_sync_run, find_address_candidates,
    finish_sync_run, get_customer_by_partner_id, list_customer_equipment, list_sync_runs,
    load_sync_cursor, load_sync_pause, replace_customer_equipment, save_sync_cursor,
    set_sync_pause, upsert_customer, DbError, NewCustomer, SyncRunCounts, SyncRunStatus,
};

fn customer(partner_id: i64, name: &str) -> NewCustomer {
    NewCustomer {
        crm_partner_id: partner_id,
        name: name.to_string(),
        display_name: name.to_string(),
        street: Some("Rua A".to_string()),
        street_number: Some("10".to_string()),
        district: Some("Centro".to_string()),
        city: Some("Maceió".to_string()),
        state: Some("AL".to_string()),
        zip: Some("57000000".to_string()),
        country: Some("Brasil".to_string()),
        full_address: Some("Rua A, 10, Centro, Maceió, AL, 57000000, Brasil".to_string()),
        latitude: Some(-9.66),
        longitude: Some(-35.73),
        ..NewCustomer::default()
    }
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn upsert_customer_is_idempotent(pool: sqlx::PgPool) {
    let first = upsert_customer(&pool, &customer(10, "Padaria")).await.unwrap();
    let before = get_customer_by_partner_id(&pool, 10).await.unwrap().unwrap();

    let second = upsert_customer(&pool, &customer(10, "Padaria")).await.unwrap();
    let after = get_customer_by_partner_id(&pool, 10).await.unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(before.public_id, after.public_id);
    assert_eq!(before.full_address, after.full_address);
    assert_eq!(before.latitude, after.latitude);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn upsert_customer_overwrites_every_field(pool: sqlx::PgPool) {
    upsert_customer(&pool, &customer(11, "Mercado")).await.unwrap();

    let mut changed = customer(11, "Mercado Central");
    changed.phone = Some("+55 82 3333-0000".to_string());
    changed.latitude = None;
    changed.longitude = None;
    upsert_customer(&pool, &changed).await.unwrap();

    let row = get_customer_by_partner_id(&pool, 11).await.unwrap().unwrap();
    assert_eq!(row.name, "Mercado Central");
    assert_eq!(row.phone.as_deref(), Some("+55 82 3333-0000"));
    assert!(row.latitude.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn equipment_is_replaced_not_merged(pool: sqlx::PgPool) {
    let id = upsert_customer(&pool, &customer(12, "Oficina")).await.unwrap();

    replace_customer_equipment(
        &pool,
        id,
        &[
            EquipmentItem::new("Gerador", Some(2)),
            EquipmentItem::new("Compressor", Some(1)),
        ],
    )
    .await
    .unwrap();
    replace_customer_equipment(&pool, id, &[EquipmentItem::new("Forno", None)])
        .await
        .unwrap();

    let rows = list_customer_equipment(&pool, id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Forno");
    assert_eq!(rows[0].quantity, None);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn address_candidates_exclude_self(pool: sqlx::PgPool) {
    upsert_customer(&pool, &customer(20, "Padaria")).await.unwrap();
    upsert_customer(&pool, &customer(21, "Padaria Filial")).await.unwrap();
    let mut elsewhere = customer(22, "Loja Recife");
    elsewhere.city = Some("Recife".to_string());
    elsewhere.zip = Some("50000000".to_string());
    elsewhere.street = Some("Avenida B".to_string());
    upsert_customer(&pool, &elsewhere).await.unwrap();

    let found = find_address_candidates(&pool, 20, Some("57000000"), Some("maceió"), None)
        .await
        .unwrap();
    let ids: Vec<i64> = found.iter().map(|c| c.crm_partner_id).collect();
    assert_eq!(ids, vec![21]);

    let none = find_address_candidates(&pool, 20, None, None, None).await.unwrap();
    assert!(none.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn street_fragment_matches_literally(pool: sqlx::PgPool) {
    upsert_customer(&pool, &customer(30, "Padaria")).await.unwrap();
    let mut underscored = customer(31, "Galpão");
    underscored.street = Some("Rua_B 100%".to_string());
    underscored.city = Some("Arapiraca".to_string());
    underscored.zip = Some("57300000".to_string());
    upsert_customer(&pool, &underscored).await.unwrap();

    let found = find_address_candidates(&pool, 99, None, None, Some("rua_"))
        .await
        .unwrap();
    let ids: Vec<i64> = found.iter().map(|c| c.crm_partner_id).collect();
    assert_eq!(ids, vec![31]);

    let found = find_address_candidates(&pool, 99, None, None, Some("%"))
        .await
        .unwrap();
    let ids: Vec<i64> = found.iter().map(|c| c.crm_partner_id).collect();
    assert_eq!(ids, vec![31]);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn cursor_and_pause_are_singletons(pool: sqlx::PgPool) {
    assert!(load_sync_cursor(&pool).await.unwrap().is_none());

    save_sync_cursor(&pool, Some(1), Some("padaria")).await.unwrap();
    save_sync_cursor(&pool, Some(2), Some("mercado")).await.unwrap();
    let cursor = load_sync_cursor(&pool).await.unwrap().unwrap();
    assert_eq!(cursor.last_resolved_id, Some(2));
    assert_eq!(cursor.last_entry_name.as_deref(), Some("mercado"));

    clear_sync_cursor(&pool).await.unwrap();
    assert!(load_sync_cursor(&pool).await.unwrap().is_none());

    let since = Utc::now() - Duration::hours(1);
    set_sync_pause(&pool, since, "fatal_network: down").await.unwrap();
    set_sync_pause(&pool, since, "fatal_network: still down").await.unwrap();
    let pause = load_sync_pause(&pool).await.unwrap().unwrap();
    assert_eq!(pause.paused_reason, "fatal_network: still down");

    clear_sync_pause(&pool).await.unwrap();
    assert!(load_sync_pause(&pool).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn sync_run_lifecycle(pool: sqlx::PgPool) {
    let run = create_sync_run(&pool).await.unwrap();
    assert_eq!(run.status, "running");

    let counts = SyncRunCounts {
        entries_total: 5,
        matched: 4,
        unmatched: 1,
        processed: 4,
        failed: 0,
    };
    finish_sync_run(&pool, run.id, SyncRunStatus::Completed, counts, None)
        .await
        .unwrap();

    let again = finish_sync_run(&pool, run.id, SyncRunStatus::Failed, counts, Some("x")).await;
    assert!(matches!(
        again,
        Err(DbError::InvalidSyncRunTransition { .. })
    ));

    let runs = list_sync_runs(&pool, 10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, "completed");
    assert_eq!(runs[0].matched, 4);
    assert!(runs[0].finished_at.is_some());
}
