//! Tests for the MIDI dispatcher

use super::*;

fn make_dispatcher(marker: Option<&str>) -> (MidiDispatcher, Arc<ManualScheduler>) {
    let scheduler = Arc::new(ManualScheduler::new());
    let config = DispatcherConfig {
        port_marker: marker.map(str::to_string),
        sysex: false,
        verbose: true,
    };
    (MidiDispatcher::new(config, scheduler.clone()), scheduler)
}

fn bytes(registry: &MemoryRegistry) -> Vec<Vec<u8>> {
    registry.sent().into_iter().map(|m| m.bytes).collect()
}

#[test]
fn test_choose_port_prefers_marker() {
    let names = vec!["Synth A".to_string(), "IAC Driver Bus 1".to_string()];
    assert_eq!(choose_port(&names, Some("iac")), Some(1));
    assert_eq!(choose_port(&names, Some("loopMIDI")), Some(0));
    assert_eq!(choose_port(&names, None), Some(0));
    assert_eq!(choose_port(&names, Some("")), Some(0));
    assert_eq!(choose_port(&[], Some("iac")), None);
}

#[tokio::test]
async fn test_initialize_selects_marker_port() {
    let registry = MemoryRegistry::new(["Synth A", "IAC Driver Bus 1", "IAC Driver Bus 2"]);
    let (dispatcher, _) = make_dispatcher(Some("IAC"));

    assert_eq!(dispatcher.state(), DispatcherState::Uninitialized);
    let selected = dispatcher
        .initialize(&MemoryAccess::new(registry))
        .await
        .unwrap();

    assert_eq!(selected.as_deref(), Some("IAC Driver Bus 1"));
    assert_eq!(dispatcher.state(), DispatcherState::Ready);
    assert_eq!(dispatcher.selected_index(), Some(1));
}

#[tokio::test]
async fn test_initialize_falls_back_to_first_port() {
    let registry = MemoryRegistry::new(["Synth A", "Synth B"]);
    let (dispatcher, _) = make_dispatcher(Some("IAC"));

    let selected = dispatcher
        .initialize(&MemoryAccess::new(registry))
        .await
        .unwrap();
    assert_eq!(selected.as_deref(), Some("Synth A"));
}

#[tokio::test]
async fn test_initialize_with_no_ports_selects_none() {
    let (dispatcher, _) = make_dispatcher(None);

    let selected = dispatcher
        .initialize(&MemoryAccess::new(MemoryRegistry::default()))
        .await
        .unwrap();

    assert_eq!(selected, None);
    assert_eq!(dispatcher.state(), DispatcherState::Ready);
    assert!(dispatcher.list_ports().is_empty());
}

#[tokio::test]
async fn test_unsupported_host_is_terminal() {
    let (dispatcher, _) = make_dispatcher(None);

    let first = dispatcher.initialize(&MemoryAccess::unsupported()).await;
    assert!(matches!(first, Err(MidiError::Unsupported(_))));
    assert_eq!(dispatcher.state(), DispatcherState::Unavailable);

    // A working host offered later is not probed again
    let registry = MemoryRegistry::new(["Synth A"]);
    let second = dispatcher.initialize(&MemoryAccess::new(registry)).await;
    assert_eq!(second, first);
    assert!(dispatcher.list_ports().is_empty());
    assert_eq!(dispatcher.note_on(60, 100), SendOutcome::NoDestination);
}

#[tokio::test]
async fn test_initialize_twice_keeps_selection() {
    let registry = MemoryRegistry::new(["Synth A", "Synth B"]);
    let (dispatcher, _) = make_dispatcher(None);
    let access = MemoryAccess::new(registry);

    dispatcher.initialize(&access).await.unwrap();
    dispatcher.select_port(1);

    let selected = dispatcher.initialize(&access).await.unwrap();
    assert_eq!(selected.as_deref(), Some("Synth B"));
}

#[test]
fn test_sends_before_initialize_are_noops() {
    let (dispatcher, scheduler) = make_dispatcher(None);

    assert_eq!(dispatcher.note_on(60, 100), SendOutcome::NoDestination);
    assert_eq!(dispatcher.note_off(60), SendOutcome::NoDestination);
    assert_eq!(dispatcher.note(60, 100, Duration::from_millis(10)), SendOutcome::NoDestination);
    assert_eq!(dispatcher.select_port(0), None);
    assert!(dispatcher.list_ports().is_empty());

    // The deferred note-off also finds no destination
    assert_eq!(scheduler.advance(Duration::from_millis(10)), 1);
}

#[tokio::test]
async fn test_note_on_and_off_bytes() {
    let registry = MemoryRegistry::new(["Synth A"]);
    let (dispatcher, _) = make_dispatcher(None);
    dispatcher
        .initialize(&MemoryAccess::new(registry.clone()))
        .await
        .unwrap();

    assert_eq!(dispatcher.note_on(64, 90), SendOutcome::Sent);
    assert_eq!(dispatcher.note_off(64), SendOutcome::Sent);

    assert_eq!(bytes(&registry), vec![vec![0x90, 64, 90], vec![0x80, 64, 0]]);
}

#[tokio::test]
async fn test_timed_note_sends_off_after_duration() {
    let registry = MemoryRegistry::new(["Synth A"]);
    let (dispatcher, scheduler) = make_dispatcher(None);
    dispatcher
        .initialize(&MemoryAccess::new(registry.clone()))
        .await
        .unwrap();

    assert_eq!(dispatcher.note(60, 100, Duration::from_millis(50)), SendOutcome::Sent);
    assert_eq!(bytes(&registry), vec![vec![0x90, 60, 100]]);

    scheduler.advance(Duration::from_millis(49));
    assert_eq!(registry.sent().len(), 1);

    scheduler.advance(Duration::from_millis(1));
    assert_eq!(bytes(&registry), vec![vec![0x90, 60, 100], vec![0x80, 60, 0]]);

    // Nothing else is pending
    assert_eq!(scheduler.pending(), 0);
    scheduler.advance(Duration::from_secs(1));
    assert_eq!(registry.sent().len(), 2);
}

#[tokio::test]
async fn test_overlapping_notes_schedule_independent_offs() {
    let registry = MemoryRegistry::new(["Synth A"]);
    let (dispatcher, scheduler) = make_dispatcher(None);
    dispatcher
        .initialize(&MemoryAccess::new(registry.clone()))
        .await
        .unwrap();

    dispatcher.note(60, 100, Duration::from_millis(100));
    scheduler.advance(Duration::from_millis(50));
    dispatcher.note(60, 80, Duration::from_millis(100));

    // First note-off cuts the second note short
    scheduler.advance(Duration::from_millis(50));
    assert_eq!(
        bytes(&registry),
        vec![vec![0x90, 60, 100], vec![0x90, 60, 80], vec![0x80, 60, 0]]
    );

    scheduler.advance(Duration::from_millis(50));
    assert_eq!(registry.sent().len(), 4);
    assert_eq!(registry.sent()[3].bytes, vec![0x80, 60, 0]);
}

#[tokio::test]
async fn test_play_uses_note_event() {
    let registry = MemoryRegistry::new(["Synth A"]);
    let (dispatcher, scheduler) = make_dispatcher(None);
    dispatcher
        .initialize(&MemoryAccess::new(registry.clone()))
        .await
        .unwrap();

    dispatcher.play(NoteEvent::new(72));
    scheduler.advance(DEFAULT_NOTE_DURATION);

    assert_eq!(
        bytes(&registry),
        vec![vec![0x90, 72, DEFAULT_VELOCITY], vec![0x80, 72, 0]]
    );
}

#[tokio::test]
async fn test_note_off_follows_current_selection() {
    let registry = MemoryRegistry::new(["Synth A", "Synth B"]);
    let (dispatcher, scheduler) = make_dispatcher(None);
    dispatcher
        .initialize(&MemoryAccess::new(registry.clone()))
        .await
        .unwrap();

    dispatcher.note(60, 100, Duration::from_millis(20));
    dispatcher.select_port(1);
    scheduler.advance(Duration::from_millis(20));

    let sent = registry.sent();
    assert_eq!(sent[0].port, "Synth A");
    assert_eq!(sent[1].port, "Synth B");
    assert_eq!(sent[1].bytes, vec![0x80, 60, 0]);
}

#[tokio::test]
async fn test_select_port_out_of_range_falls_back_to_first() {
    let registry = MemoryRegistry::new(["Synth A", "Synth B"]);
    let (dispatcher, _) = make_dispatcher(None);
    dispatcher
        .initialize(&MemoryAccess::new(registry))
        .await
        .unwrap();

    assert_eq!(dispatcher.select_port(1).as_deref(), Some("Synth B"));
    assert_eq!(dispatcher.select_port(7).as_deref(), Some("Synth A"));
    assert_eq!(dispatcher.selected_index(), Some(0));
}

#[tokio::test]
async fn test_select_port_with_empty_set_selects_none() {
    let (dispatcher, _) = make_dispatcher(None);
    dispatcher
        .initialize(&MemoryAccess::new(MemoryRegistry::default()))
        .await
        .unwrap();

    assert_eq!(dispatcher.select_port(0), None);
    assert_eq!(dispatcher.selected_port(), None);
    assert_eq!(dispatcher.note_on(60, 100), SendOutcome::NoDestination);
}

#[tokio::test]
async fn test_list_ports_in_host_order() {
    let registry = MemoryRegistry::new(["Zeta", "Alpha", "Mid"]);
    let (dispatcher, _) = make_dispatcher(None);
    dispatcher
        .initialize(&MemoryAccess::new(registry))
        .await
        .unwrap();

    assert_eq!(dispatcher.list_ports(), vec!["Zeta", "Alpha", "Mid"]);
}

#[test]
fn test_verbose_toggle() {
    let (dispatcher, _) = make_dispatcher(None);
    assert!(dispatcher.is_verbose());
    dispatcher.set_verbose(false);
    assert!(!dispatcher.is_verbose());
}

#[test]
fn test_pitch_to_frequency() {
    assert!((MidiDispatcher::pitch_to_frequency(69) - 440.0).abs() < 1e-9);
    assert!((MidiDispatcher::pitch_to_frequency(81) - 880.0).abs() < 1e-9);
    assert!((MidiDispatcher::pitch_to_frequency(57) - 220.0).abs() < 1e-9);
}

struct RejectingRegistry;

struct RejectingPort;

impl OutputRegistry for RejectingRegistry {
    fn port_names(&self) -> Vec<String> {
        vec!["Broken".to_string()]
    }

    fn open(&self, _index: usize) -> Result<Box<dyn OutputPort>, MidiError> {
        Ok(Box::new(RejectingPort))
    }
}

impl OutputPort for RejectingPort {
    fn name(&self) -> &str {
        "Broken"
    }

    fn send(&mut self, _bytes: &[u8]) -> Result<(), MidiError> {
        Err(MidiError::Send("device gone".to_string()))
    }
}

struct RejectingAccess;

#[async_trait::async_trait]
impl MidiAccess for RejectingAccess {
    async fn request_access(&self, _options: AccessOptions) -> Result<Box<dyn OutputRegistry>, MidiError> {
        Ok(Box::new(RejectingRegistry))
    }
}

#[tokio::test]
async fn test_send_failure_is_reported_not_raised() {
    let (dispatcher, _) = make_dispatcher(None);
    dispatcher.initialize(&RejectingAccess).await.unwrap();

    assert_eq!(dispatcher.note_on(60, 100), SendOutcome::Failed);
}

#[tokio::test]
async fn test_out_of_range_values_are_not_wrapped() {
    let registry = MemoryRegistry::new(["Synth A"]);
    let (dispatcher, scheduler) = make_dispatcher(None);
    dispatcher
        .initialize(&MemoryAccess::new(registry.clone()))
        .await
        .unwrap();

    assert_eq!(dispatcher.note_on(188, 100), SendOutcome::Invalid);
    assert_eq!(dispatcher.note_on(60, 228), SendOutcome::Invalid);
    assert_eq!(dispatcher.note_off(200), SendOutcome::Invalid);
    assert_eq!(
        dispatcher.note(130, 100, Duration::from_millis(10)),
        SendOutcome::Invalid
    );

    assert_eq!(scheduler.pending(), 0);
    assert!(bytes(&registry).is_empty());
}

struct CountingAccess {
    registry: MemoryRegistry,
    requests: std::sync::atomic::AtomicUsize,
}

#[async_trait::async_trait]
impl MidiAccess for CountingAccess {
    async fn request_access(&self, _options: AccessOptions) -> Result<Box<dyn OutputRegistry>, MidiError> {
        self.requests
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(Box::new(self.registry.clone()))
    }
}

#[tokio::test]
async fn test_concurrent_initialize_requests_access_once() {
    let access = CountingAccess {
        registry: MemoryRegistry::new(["Synth A"]),
        requests: std::sync::atomic::AtomicUsize::new(0),
    };
    let (dispatcher, _) = make_dispatcher(None);
    let other = dispatcher.clone();

    let (first, second) = tokio::join!(dispatcher.initialize(&access), other.initialize(&access));

    assert_eq!(first.unwrap().as_deref(), Some("Synth A"));
    assert_eq!(second.unwrap().as_deref(), Some("Synth A"));
    assert_eq!(access.requests.load(std::sync::atomic::Ordering::SeqCst), 1);
}
