//! End-to-end directive dispatch over an in-memory store: model replies go
//! in, annotated display text and persisted state come out.

use violeta::db::Store;
use violeta::dispatch::{DispatchError, Dispatcher};
use violeta::memory::ProfileMemory;

const TS: &str = "2025-12-01 10:00:00";

#[tokio::test]
async fn task_lifecycle_through_directives() {
    let store = Store::open_in_memory().unwrap();
    let dispatcher = Dispatcher::new(&store);

    let outcome = dispatcher
        .run(
            "Listo, la agendo.\nTAREA_CMD: AGREGAR | Informe | 2025-12-09 | Buscar datos | Redactar | Revisar",
            TS,
        )
        .await;
    assert!(outcome.display_text.starts_with("Listo, la agendo."));
    assert!(outcome
        .display_text
        .contains("✅ Tarea agregada con 3 subtareas."));
    assert!(!outcome.display_text.contains("TAREA_CMD"));

    let id = store.list_tasks().unwrap()[0].id;

    let outcome = dispatcher
        .run(&format!("Marcado.\nTAREA_CMD: CHECK | {} | 1", id), TS)
        .await;
    assert!(outcome.display_text.contains("📈 Avance actualizado."));

    let outcome = dispatcher.run("TAREA_CMD: LISTAR", TS).await;
    assert!(outcome.display_text.contains("| ID | Tarea | Subtareas | Avance |"));
    assert!(outcome.display_text.contains("Informe"));
    assert!(outcome.display_text.contains("**33%**"));

    let outcome = dispatcher
        .run(&format!("TAREA_CMD: EXTENDER | {}", id), TS)
        .await;
    assert!(outcome.display_text.contains("➕ Subtarea adicional agregada."));
    let task = store.get_task(id).unwrap().unwrap();
    assert_eq!(task.slots[3], Some(false));
}

#[tokio::test]
async fn inline_directive_leaves_clean_prefix() {
    let store = Store::open_in_memory().unwrap();
    let outcome = Dispatcher::new(&store)
        .run("Hi ||| TAREA_CMD: LISTAR", TS)
        .await;

    assert!(outcome.display_text.starts_with("Hi\n"));
    assert!(outcome.display_text.contains("No hay tareas registradas."));
}

#[tokio::test]
async fn malformed_directive_is_reported_not_dropped() {
    let store = Store::open_in_memory().unwrap();
    let outcome = Dispatcher::new(&store)
        .run("Hecho.\nTAREA_CMD: CHECK | 2", TS)
        .await;

    assert_eq!(outcome.reports.len(), 1);
    assert!(matches!(
        outcome.reports[0].outcome,
        Err(DispatchError::Parse(_))
    ));
    assert!(outcome.display_text.contains("❌ Error procesando tarea"));
    // Nothing was written
    assert!(store.list_tasks().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_task_row_surfaces_as_error() {
    let store = Store::open_in_memory().unwrap();
    let outcome = Dispatcher::new(&store)
        .run("TAREA_CMD: CHECK | 99 | 1", TS)
        .await;

    assert!(matches!(
        outcome.reports[0].outcome,
        Err(DispatchError::Task(_))
    ));
    assert!(outcome.display_text.contains("no existe la tarea 99"));
}

#[tokio::test]
async fn memory_directive_persists_fact_with_timestamp() {
    let store = Store::open_in_memory().unwrap();
    let outcome = Dispatcher::new(&store)
        .run("Anotado.\nMEMORIA_CMD: Prefiere café sin azúcar", TS)
        .await;

    assert!(outcome.display_text.contains("(💾 Guardado en perfil)"));
    assert_eq!(
        ProfileMemory::new(&store).profile_text().unwrap(),
        "2025-12-01 10:00:00 Prefiere café sin azúcar\n"
    );
}

#[tokio::test]
async fn calendar_without_client_reports_not_configured() {
    let store = Store::open_in_memory().unwrap();
    let outcome = Dispatcher::new(&store)
        .run(
            "CALENDAR_CMD: Dentista | 2025-12-09 10:00 | 2025-12-09 11:00 | Llevar placa",
            TS,
        )
        .await;

    assert!(matches!(
        outcome.reports[0].outcome,
        Err(DispatchError::CalendarNotConfigured)
    ));
    assert!(outcome
        .display_text
        .contains("❌ Error de calendario: calendario no configurado"));
}

#[tokio::test]
async fn email_without_sender_reports_not_configured() {
    let store = Store::open_in_memory().unwrap();
    let outcome = Dispatcher::new(&store)
        .run("EMAIL_CMD: ana@example.com | Saludos | Hola Ana", TS)
        .await;

    assert!(matches!(
        outcome.reports[0].outcome,
        Err(DispatchError::EmailNotConfigured)
    ));
    assert!(outcome.display_text.contains("❌ Error correo"));
}

#[tokio::test]
async fn multiple_directives_run_in_text_order() {
    let store = Store::open_in_memory().unwrap();
    let outcome = Dispatcher::new(&store)
        .run(
            "Todo listo.\nTAREA_CMD: AGREGAR | Compras | 2025-12-05 | Frutas\nMEMORIA_CMD: Compra los viernes\nGracias por avisar.",
            TS,
        )
        .await;

    assert_eq!(outcome.reports.len(), 2);
    assert!(outcome.reports.iter().all(|r| r.outcome.is_ok()));
    assert!(outcome.display_text.contains("Todo listo."));
    assert!(outcome.display_text.contains("Gracias por avisar."));
    assert!(outcome.display_text.contains("Tarea agregada con 1 subtareas."));
    assert!(outcome.display_text.contains("(💾 Guardado en perfil)"));
}

#[tokio::test]
async fn escaped_pipe_reaches_the_stored_title() {
    let store = Store::open_in_memory().unwrap();
    Dispatcher::new(&store)
        .run(
            r"TAREA_CMD: AGREGAR | Revisar A \| B | 2025-12-09 | Leer",
            TS,
        )
        .await;

    assert_eq!(store.list_tasks().unwrap()[0].title, "Revisar A | B");
}
