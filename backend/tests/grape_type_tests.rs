//! Grape-type catalog tests
//!
//! Bulk assignment at creation is all-or-nothing: a single parcel that
//! cannot accept the cultivar leaves no catalog row behind.

mod common;

use common::*;
use shared::PlantingState;
use uuid::Uuid;
use vineyard_backend::services::grape_type::UpdateGrapeTypeInput;
use vineyard_backend::AppError;

#[tokio::test]
async fn test_create_assigns_every_listed_parcel() {
    let services = Services::in_memory();
    let (north, north_planting) = services.planted_parcel("North").await;
    let (south, south_planting) = services.planted_parcel("South").await;

    let view = services
        .grape_types
        .create_grape_type(grape_type_input("Carmenere", vec![north, south]))
        .await
        .unwrap();

    let mut names: Vec<&str> = view.parcels.iter().map(|p| p.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["North", "South"]);

    for planting_id in [north_planting, south_planting] {
        let detail = services.plantings.get_planting(planting_id).await.unwrap();
        assert_eq!(detail.view.planting.grape_type_id, Some(view.grape_type.id));
        assert_eq!(
            detail.view.grape_type_name.as_deref(),
            Some("Carmenere")
        );
    }
}

#[tokio::test]
async fn test_create_rolls_back_when_one_parcel_refuses() {
    let services = Services::in_memory();
    let (planted, planted_planting) = services.planted_parcel("Planted").await;
    let unplanted = services.ready_parcel("Fallow").await;

    let result = services
        .grape_types
        .create_grape_type(grape_type_input("Syrah", vec![planted, unplanted]))
        .await;
    assert!(matches!(result, Err(AppError::Conflict { .. })));

    // No catalog row and the first parcel's planting is untouched
    assert!(services.grape_types.list_grape_types().await.unwrap().is_empty());
    let detail = services.plantings.get_planting(planted_planting).await.unwrap();
    assert!(detail.view.planting.grape_type_id.is_none());
}

#[tokio::test]
async fn test_create_rolls_back_on_unknown_parcel() {
    let services = Services::in_memory();
    let (planted, _) = services.planted_parcel("Real").await;

    let result = services
        .grape_types
        .create_grape_type(grape_type_input("Merlot", vec![planted, Uuid::new_v4()]))
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(services.grape_types.list_grape_types().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_parcel_ids_collapse() {
    let services = Services::in_memory();
    let (parcel_id, _) = services.planted_parcel("Twice").await;

    let view = services
        .grape_types
        .create_grape_type(grape_type_input("Malbec", vec![parcel_id, parcel_id]))
        .await
        .unwrap();
    assert_eq!(view.parcels.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_creates_settle_on_one_grape_type() {
    let services = Services::in_memory();
    let (east, east_planting) = services.planted_parcel("East").await;
    let (west, west_planting) = services.planted_parcel("West").await;

    let forward = services.grape_types.clone();
    let backward = services.grape_types.clone();
    let (a, b) = tokio::join!(
        tokio::spawn(async move {
            forward
                .create_grape_type(grape_type_input("Carmenere", vec![east, west]))
                .await
        }),
        tokio::spawn(async move {
            backward
                .create_grape_type(grape_type_input("Merlot", vec![west, east]))
                .await
        }),
    );

    let results = [a.unwrap(), b.unwrap()];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let winner = results
        .iter()
        .find_map(|r| r.as_ref().ok())
        .unwrap()
        .grape_type
        .id;
    for result in &results {
        if let Err(e) = result {
            assert!(matches!(e, AppError::Conflict { .. }));
        }
    }

    // Both parcels went to the same cultivar and the loser left no row
    for planting_id in [east_planting, west_planting] {
        let detail = services.plantings.get_planting(planting_id).await.unwrap();
        assert_eq!(detail.view.planting.grape_type_id, Some(winner));
    }
    assert_eq!(services.grape_types.list_grape_types().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_catalog_without_parcels_and_name_rules() {
    let services = Services::in_memory();

    let view = services
        .grape_types
        .create_grape_type(grape_type_input("  Pais  ", vec![]))
        .await
        .unwrap();
    assert_eq!(view.grape_type.name, "Pais");
    assert!(view.parcels.is_empty());

    let duplicate = services
        .grape_types
        .create_grape_type(grape_type_input("PAIS", vec![]))
        .await;
    assert!(matches!(duplicate, Err(AppError::Validation { .. })));

    let mut inverted = grape_type_input("Inverted", vec![]);
    inverted.ph = shared::RequirementRange::new(dec("7"), dec("5"));
    let result = services.grape_types.create_grape_type(inverted).await;
    assert!(matches!(result, Err(AppError::Validation { .. })));
}

#[tokio::test]
async fn test_get_and_list_include_planted_parcels() {
    let services = Services::in_memory();
    let (parcel_id, planting_id) = services.planted_parcel("Cordillera").await;

    let created = services
        .grape_types
        .create_grape_type(grape_type_input("Cabernet", vec![parcel_id]))
        .await
        .unwrap();
    services
        .grape_types
        .create_grape_type(grape_type_input("Albarino", vec![]))
        .await
        .unwrap();

    // Deactivating keeps the planting in the cultivar's history
    services
        .plantings
        .set_state(planting_id, PlantingState::Inactive)
        .await
        .unwrap();

    let fetched = services
        .grape_types
        .get_grape_type(created.grape_type.id)
        .await
        .unwrap();
    assert_eq!(fetched.parcels.len(), 1);
    assert_eq!(fetched.parcels[0].id, parcel_id);

    let listed = services.grape_types.list_grape_types().await.unwrap();
    let names: Vec<&str> = listed.iter().map(|v| v.grape_type.name.as_str()).collect();
    assert_eq!(names, vec!["Albarino", "Cabernet"]);
    assert!(listed[0].parcels.is_empty());
    assert_eq!(listed[1].parcels.len(), 1);
}

#[tokio::test]
async fn test_update_grape_type() {
    let services = Services::in_memory();
    let first = services
        .grape_types
        .create_grape_type(grape_type_input("Semillon", vec![]))
        .await
        .unwrap();
    services
        .grape_types
        .create_grape_type(grape_type_input("Riesling", vec![]))
        .await
        .unwrap();

    let updated = services
        .grape_types
        .update_grape_type(
            first.grape_type.id,
            UpdateGrapeTypeInput {
                harvest_duration_days: Some(200),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.requirements.harvest_duration_days, 200);
    assert_eq!(updated.name, "Semillon");

    let clash = services
        .grape_types
        .update_grape_type(
            first.grape_type.id,
            UpdateGrapeTypeInput {
                name: Some("riesling".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(clash, Err(AppError::Validation { .. })));

    let missing = services
        .grape_types
        .update_grape_type(Uuid::new_v4(), UpdateGrapeTypeInput::default())
        .await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_assign_to_planting_conflicts() {
    let services = Services::in_memory();
    let (parcel_id, planting_id) = services.planted_parcel("Assign").await;
    let grape = services
        .grape_types
        .create_grape_type(grape_type_input("Pinot", vec![]))
        .await
        .unwrap()
        .grape_type
        .id;

    services
        .plantings
        .assign_grape_type(planting_id, grape)
        .await
        .unwrap();

    let again = services.plantings.assign_grape_type(planting_id, grape).await;
    assert!(matches!(again, Err(AppError::Conflict { .. })));

    let via_parcel = services
        .plantings
        .assign_grape_type_to_parcel(parcel_id, grape)
        .await;
    assert!(matches!(via_parcel, Err(AppError::Conflict { .. })));

    services
        .plantings
        .set_state(planting_id, PlantingState::Inactive)
        .await
        .unwrap();
    let inactive = services.plantings.assign_grape_type(planting_id, grape).await;
    assert!(matches!(inactive, Err(AppError::Conflict { .. })));

    let unknown = services
        .plantings
        .assign_grape_type(planting_id, Uuid::new_v4())
        .await;
    assert!(matches!(unknown, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_assign_through_parcel() {
    let services = Services::in_memory();
    let (parcel_id, planting_id) = services.planted_parcel("Valley").await;
    let grape = services
        .grape_types
        .create_grape_type(grape_type_input("Chardonnay", vec![]))
        .await
        .unwrap()
        .grape_type
        .id;

    let planting = services
        .plantings
        .assign_grape_type_to_parcel(parcel_id, grape)
        .await
        .unwrap();
    assert_eq!(planting.id, planting_id);
    assert_eq!(planting.grape_type_id, Some(grape));

    let empty = services.ready_parcel("Empty").await;
    let no_planting = services
        .plantings
        .assign_grape_type_to_parcel(empty, grape)
        .await;
    assert!(matches!(no_planting, Err(AppError::Conflict { .. })));
}
