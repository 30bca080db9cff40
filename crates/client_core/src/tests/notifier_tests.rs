use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
enum SurfaceEvent {
    Presented(String, Severity, Duration),
    Withdrawn(String),
}

#[derive(Default)]
struct RecordingSurface {
    events: Mutex<Vec<SurfaceEvent>>,
}

impl RecordingSurface {
    fn events(&self) -> Vec<SurfaceEvent> {
        self.events.lock().expect("events lock").clone()
    }
}

impl ToastSurface for RecordingSurface {
    fn present(&self, message: &DispatchedMessage, duration: Duration) {
        self.events.lock().expect("events lock").push(SurfaceEvent::Presented(
            message.text.clone(),
            message.kind,
            duration,
        ));
    }

    fn withdraw(&self, message: &DispatchedMessage) {
        self.events
            .lock()
            .expect("events lock")
            .push(SurfaceEvent::Withdrawn(message.text.clone()));
    }
}

fn dispatcher_with(max_visible: usize) -> (Arc<NotificationDispatcher>, Arc<RecordingSurface>) {
    let surface = Arc::new(RecordingSurface::default());
    let config = DispatcherConfig {
        max_visible,
        ..DispatcherConfig::default()
    };
    (NotificationDispatcher::new(config, surface.clone()), surface)
}

#[tokio::test(start_paused = true)]
async fn identical_text_collapses_to_one_toast() {
    let (dispatcher, surface) = dispatcher_with(1);

    let first = dispatcher.error("Falha ao carregar eventos");
    let second = dispatcher.error("Falha ao carregar eventos");

    assert_eq!(first, second);
    assert_eq!(dispatcher.active_count(), 1);
    assert_eq!(surface.events().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn dedup_ignores_kind() {
    let (dispatcher, _surface) = dispatcher_with(2);

    let first = dispatcher.info("Salvo");
    let second = dispatcher.success("Salvo");

    assert_eq!(first, second);
    assert_eq!(dispatcher.active_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn single_slot_replaces_previous_message() {
    let (dispatcher, surface) = dispatcher_with(1);

    dispatcher.info("A");
    dispatcher.info("B");

    assert!(!dispatcher.is_active("A"));
    assert!(dispatcher.is_active("B"));
    assert_eq!(dispatcher.active_count(), 1);
    assert_eq!(
        surface.events(),
        vec![
            SurfaceEvent::Presented("A".into(), Severity::Info, Duration::from_millis(4_000)),
            SurfaceEvent::Withdrawn("A".into()),
            SurfaceEvent::Presented("B".into(), Severity::Info, Duration::from_millis(4_000)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn reaching_the_cap_clears_every_visible_message() {
    let (dispatcher, _surface) = dispatcher_with(3);

    dispatcher.info("one");
    dispatcher.info("two");
    dispatcher.info("three");
    assert_eq!(dispatcher.active_count(), 3);

    dispatcher.info("four");
    assert_eq!(dispatcher.active_count(), 1);
    assert!(dispatcher.is_active("four"));
}

#[tokio::test(start_paused = true)]
async fn non_error_toasts_expire_after_four_seconds() {
    let (dispatcher, surface) = dispatcher_with(1);
    dispatcher.success("Presença confirmada");

    tokio::time::sleep(Duration::from_millis(3_999)).await;
    assert!(dispatcher.is_active("Presença confirmada"));

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert!(!dispatcher.is_active("Presença confirmada"));
    assert_eq!(
        surface.events().last(),
        Some(&SurfaceEvent::Withdrawn("Presença confirmada".into()))
    );
}

#[tokio::test(start_paused = true)]
async fn error_toasts_dwell_longer() {
    let (dispatcher, _surface) = dispatcher_with(1);
    dispatcher.error("Erro interno");

    tokio::time::sleep(Duration::from_millis(5_000)).await;
    assert!(dispatcher.is_active("Erro interno"));

    tokio::time::sleep(Duration::from_millis(1_001)).await;
    assert_eq!(dispatcher.active_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn explicit_duration_overrides_kind_default() {
    let (dispatcher, _surface) = dispatcher_with(1);
    dispatcher.show(
        "Carregando...",
        Severity::Loading,
        ShowOptions {
            duration: Some(Duration::from_millis(500)),
        },
    );

    tokio::time::sleep(Duration::from_millis(501)).await;
    assert!(!dispatcher.is_active("Carregando..."));
}

#[tokio::test(start_paused = true)]
async fn dismiss_removes_only_the_matching_text() {
    let (dispatcher, surface) = dispatcher_with(2);
    dispatcher.info("keep");
    dispatcher.info("drop");

    assert!(dispatcher.dismiss("drop"));
    assert!(!dispatcher.dismiss("drop"));
    assert!(dispatcher.is_active("keep"));
    assert_eq!(dispatcher.active_count(), 1);
    assert!(surface
        .events()
        .contains(&SurfaceEvent::Withdrawn("drop".into())));
}

#[tokio::test(start_paused = true)]
async fn reshown_text_is_not_removed_by_the_old_timer() {
    let (dispatcher, _surface) = dispatcher_with(1);
    let first = dispatcher.info("again");

    tokio::time::sleep(Duration::from_millis(3_000)).await;
    dispatcher.dismiss("again");
    let second = dispatcher.info("again");
    assert_ne!(first, second);

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert!(dispatcher.is_active("again"));

    tokio::time::sleep(Duration::from_millis(2_600)).await;
    assert!(!dispatcher.is_active("again"));
}

#[tokio::test(start_paused = true)]
async fn clear_all_empties_the_registry() {
    let (dispatcher, surface) = dispatcher_with(3);
    dispatcher.info("a");
    dispatcher.error("b");

    dispatcher.clear_all();

    assert_eq!(dispatcher.active_count(), 0);
    let withdrawn = surface
        .events()
        .into_iter()
        .filter(|event| matches!(event, SurfaceEvent::Withdrawn(_)))
        .count();
    assert_eq!(withdrawn, 2);

    // Timers of cleared toasts must not withdraw anything twice.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(surface.events().len(), 4);
}

#[test]
fn works_without_a_runtime() {
    let (dispatcher, _surface) = dispatcher_with(1);
    dispatcher.error("offline");
    assert!(dispatcher.is_active("offline"));
    assert!(dispatcher.dismiss("offline"));
    assert_eq!(dispatcher.active_count(), 0);
}

#[test]
fn zero_cap_is_raised_to_one() {
    let (dispatcher, _surface) = dispatcher_with(0);
    assert_eq!(dispatcher.config().max_visible, 1);
    dispatcher.info("visible");
    assert_eq!(dispatcher.active_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn oversized_duration_saturates_instead_of_panicking() {
    let (dispatcher, surface) = dispatcher_with(1);
    dispatcher.show(
        "Sincronizando agenda",
        Severity::Loading,
        ShowOptions {
            duration: Some(Duration::MAX),
        },
    );

    tokio::time::sleep(Duration::from_secs(3_600)).await;
    assert!(dispatcher.is_active("Sincronizando agenda"));
    assert_eq!(surface.events().len(), 1);
}
