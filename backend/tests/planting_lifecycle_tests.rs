//! Planting lifecycle and parcel consistency tests
//!
//! Covers the stage ordering Dimensions → Soil control → Planting, the
//! single-active-planting rule under concurrency, and state transitions.

mod common;

use common::*;
use proptest::prelude::*;
use shared::PlantingState;
use uuid::Uuid;
use vineyard_backend::services::planting::UpdatePlantingInput;
use vineyard_backend::AppError;

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_lot_seven_scenario() {
    let services = Services::in_memory();

    let view = services
        .parcels
        .create_parcel(parcel_input("Lot-7", "-71.2", "-33.4"))
        .await
        .unwrap();
    let parcel_id = view.parcel.id;

    services
        .dimensions
        .record_dimensions(parcel_id, dimensions("1000", "5"))
        .await
        .unwrap();
    services
        .soil_controls
        .record_control(parcel_id, reading("6.5"))
        .await
        .unwrap();

    let planting = services
        .plantings
        .create_planting(planting_input(parcel_id, 500))
        .await
        .unwrap();
    assert_eq!(planting.state, PlantingState::Active);
    assert_eq!(planting.technique, "trellis");

    let second = services
        .plantings
        .create_planting(planting_input(parcel_id, 300))
        .await;
    assert!(matches!(second, Err(AppError::Prerequisite { .. })));

    let parcel = services.parcels.get_parcel(parcel_id).await.unwrap();
    assert_eq!(parcel.planting.unwrap().planting.id, planting.id);
    assert_eq!(parcel.plant_density, Some(dec("0.5")));
}

#[tokio::test]
async fn test_soil_control_requires_dimensions() {
    let services = Services::in_memory();
    let parcel_id = services.parcel("Bare").await;

    let result = services
        .soil_controls
        .record_control(parcel_id, reading("6.5"))
        .await;
    assert!(matches!(result, Err(AppError::Prerequisite { .. })));

    let ledger = services
        .soil_controls
        .get_current_and_history(parcel_id)
        .await
        .unwrap();
    assert!(ledger.current.is_none());
    assert!(ledger.history.is_empty());
}

#[tokio::test]
async fn test_planting_prerequisites_reported_in_order() {
    let services = Services::in_memory();
    let parcel_id = services.parcel("Ordered").await;

    let no_dimensions = services
        .plantings
        .create_planting(planting_input(parcel_id, 100))
        .await
        .unwrap_err();
    assert!(no_dimensions.to_string().contains("no dimensions"));

    services
        .dimensions
        .record_dimensions(parcel_id, dimensions("800", "2"))
        .await
        .unwrap();

    let no_soil = services
        .plantings
        .create_planting(planting_input(parcel_id, 100))
        .await
        .unwrap_err();
    assert!(no_soil.to_string().contains("no soil controls"));
}

#[tokio::test]
async fn test_unknown_parcel_and_grape_type_are_not_found() {
    let services = Services::in_memory();

    let unknown_parcel = services
        .plantings
        .create_planting(planting_input(Uuid::new_v4(), 100))
        .await;
    assert!(matches!(unknown_parcel, Err(AppError::NotFound(_))));

    let parcel_id = services.ready_parcel("Known").await;
    let mut input = planting_input(parcel_id, 100);
    input.grape_type_id = Some(Uuid::new_v4());
    let unknown_grape = services.plantings.create_planting(input).await;
    assert!(matches!(unknown_grape, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_dimensions_locked_until_planting_inactive() {
    let services = Services::in_memory();
    let (parcel_id, planting_id) = services.planted_parcel("Locked").await;

    let blocked = services
        .dimensions
        .record_dimensions(parcel_id, dimensions("1200", "6"))
        .await;
    assert!(matches!(blocked, Err(AppError::Prerequisite { .. })));

    services
        .plantings
        .set_state(planting_id, PlantingState::Inactive)
        .await
        .unwrap();

    let record = services
        .dimensions
        .record_dimensions(parcel_id, dimensions("1200", "6"))
        .await
        .unwrap();

    let ledger = services
        .dimensions
        .get_current_and_history(parcel_id)
        .await
        .unwrap();
    assert_eq!(ledger.current.unwrap().id, record.id);
    assert_eq!(ledger.history.len(), 2);
}

#[tokio::test]
async fn test_reactivation_blocked_by_other_active_planting() {
    let services = Services::in_memory();
    let (parcel_id, first) = services.planted_parcel("Rotation").await;

    services
        .plantings
        .set_state(first, PlantingState::Inactive)
        .await
        .unwrap();
    let second = services
        .plantings
        .create_planting(planting_input(parcel_id, 250))
        .await
        .unwrap();

    let reactivate = services.plantings.set_state(first, PlantingState::Active).await;
    assert!(matches!(reactivate, Err(AppError::Prerequisite { .. })));

    // Same-state transition is a no-op
    let unchanged = services
        .plantings
        .set_state(second.id, PlantingState::Active)
        .await
        .unwrap();
    assert_eq!(unchanged.state, PlantingState::Active);

    let history = services.plantings.get_history(parcel_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].planting.id, second.id);
    assert_eq!(
        services
            .plantings
            .get_active_planting(parcel_id)
            .await
            .unwrap()
            .planting
            .id,
        second.id
    );
}

#[tokio::test]
async fn test_update_planting_keeps_state() {
    let services = Services::in_memory();
    let (_, planting_id) = services.planted_parcel("Edited").await;

    let updated = services
        .plantings
        .update_planting(
            planting_id,
            UpdatePlantingInput {
                plant_count: Some(640),
                technique: Some("  goblet ".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.plant_count, 640);
    assert_eq!(updated.technique, "goblet");
    assert_eq!(updated.state, PlantingState::Active);

    let invalid = services
        .plantings
        .update_planting(
            planting_id,
            UpdatePlantingInput {
                plant_count: Some(0),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(invalid, Err(AppError::Validation { .. })));
}

#[tokio::test]
async fn test_parcel_creation_with_initial_setup() {
    let services = Services::in_memory();

    let mut input = parcel_input("Atomic", "-70.9", "-34.1");
    input.initial_dimensions = Some(dimensions("500", "0"));
    input.initial_soil_control = Some(reading("7.1"));
    let view = services.parcels.create_parcel(input).await.unwrap();
    assert!(view.current_dimensions.is_some());
    assert!(view.current_soil_control.is_some());

    services
        .plantings
        .create_planting(planting_input(view.parcel.id, 50))
        .await
        .unwrap();

    // Soil control without dimensions rolls back the parcel too
    let mut orphan = parcel_input("Orphan", "-70.9", "-34.1");
    orphan.initial_soil_control = Some(reading("7.1"));
    let result = services.parcels.create_parcel(orphan).await;
    assert!(matches!(result, Err(AppError::Prerequisite { .. })));

    let names: Vec<String> = services
        .parcels
        .list_parcels()
        .await
        .unwrap()
        .into_iter()
        .map(|view| view.parcel.name)
        .collect();
    assert_eq!(names, vec!["Atomic".to_string()]);
}

#[tokio::test]
async fn test_parcel_validation() {
    let services = Services::in_memory();
    services.parcel("Lot-1").await;

    let duplicate = services
        .parcels
        .create_parcel(parcel_input(" lot-1 ", "0", "0"))
        .await;
    assert!(matches!(duplicate, Err(AppError::Validation { .. })));

    let off_globe = services
        .parcels
        .create_parcel(parcel_input("Far", "180.5", "0"))
        .await;
    assert!(matches!(off_globe, Err(AppError::Validation { .. })));

    let blank = services
        .parcels
        .create_parcel(parcel_input("   ", "0", "0"))
        .await;
    assert!(matches!(blank, Err(AppError::Validation { .. })));
}

#[tokio::test]
async fn test_slope_boundaries() {
    let services = Services::in_memory();
    let parcel_id = services.parcel("Hillside").await;

    for slope in ["0", "100"] {
        services
            .dimensions
            .record_dimensions(parcel_id, dimensions("1000", slope))
            .await
            .unwrap();
    }
    for slope in ["100.0001", "-0.0001"] {
        let result = services
            .dimensions
            .record_dimensions(parcel_id, dimensions("1000", slope))
            .await;
        assert!(matches!(result, Err(AppError::Validation { .. })));
    }
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_plantings_admit_exactly_one() {
    let services = Services::in_memory();
    let parcel_id = services.ready_parcel("Contended").await;

    let mut handles = Vec::new();
    for n in 0..16 {
        let plantings = services.plantings.clone();
        handles.push(tokio::spawn(async move {
            plantings
                .create_planting(planting_input(parcel_id, 100 + n))
                .await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(e) => assert!(matches!(e, AppError::Prerequisite { .. })),
        }
    }
    assert_eq!(successes, 1);

    let active = services
        .plantings
        .get_history(parcel_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|view| view.planting.is_active())
        .count();
    assert_eq!(active, 1);
}

// ============================================================================
// Property Tests
// ============================================================================

#[derive(Debug, Clone)]
enum Step {
    Dimensions,
    SoilControl,
    Plant,
    Deactivate,
    Reactivate,
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Dimensions),
        Just(Step::SoilControl),
        Just(Step::Plant),
        Just(Step::Deactivate),
        Just(Step::Reactivate),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Whatever order operations arrive in, a parcel never has more than one
    /// active planting and a planting never exists without dimensions and
    /// soil controls recorded before it.
    #[test]
    fn prop_at_most_one_active_planting(steps in prop::collection::vec(step_strategy(), 1..24)) {
        tokio_test::block_on(async {
            let services = Services::in_memory();
            let parcel_id = services.parcel("Random").await;
            let mut plantings: Vec<Uuid> = Vec::new();

            for step in steps {
                match step {
                    Step::Dimensions => {
                        let _ = services
                            .dimensions
                            .record_dimensions(parcel_id, dimensions("900", "3"))
                            .await;
                    }
                    Step::SoilControl => {
                        let _ = services
                            .soil_controls
                            .record_control(parcel_id, reading("6.8"))
                            .await;
                    }
                    Step::Plant => {
                        if let Ok(planting) = services
                            .plantings
                            .create_planting(planting_input(parcel_id, 120))
                            .await
                        {
                            plantings.push(planting.id);
                        }
                    }
                    Step::Deactivate => {
                        if let Some(id) = plantings.last() {
                            services
                                .plantings
                                .set_state(*id, PlantingState::Inactive)
                                .await
                                .unwrap();
                        }
                    }
                    Step::Reactivate => {
                        if let Some(id) = plantings.first() {
                            let _ = services.plantings.set_state(*id, PlantingState::Active).await;
                        }
                    }
                }

                let history = services.plantings.get_history(parcel_id).await.unwrap();
                let active = history.iter().filter(|v| v.planting.is_active()).count();
                assert!(active <= 1);

                if !history.is_empty() {
                    let dims = services.dimensions.get_current_and_history(parcel_id).await.unwrap();
                    let soil = services.soil_controls.get_current_and_history(parcel_id).await.unwrap();
                    assert!(dims.current.is_some());
                    assert!(soil.current.is_some());
                }
            }
        });
    }
}
