use image::{Rgb, RgbImage};
use photo_presenter::collection::SortKey;
use photo_presenter::config::Settings;
use photo_presenter::error::Error;
use photo_presenter::events::{PresenterCommand, PresenterEvent, PresenterPhase};
use photo_presenter::item::Rotation;
use photo_presenter::monitor::{MonitorGeometry, StaticMonitors};
use photo_presenter::session::Session;
use photo_presenter::tasks::presenter::{self, HeadlessSurface, PresenterHandle};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::tempdir;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(10);

type Spawned = (
    PresenterHandle,
    mpsc::UnboundedReceiver<PresenterEvent>,
    CancellationToken,
    JoinHandle<anyhow::Result<()>>,
);

fn spawn_presenter(monitors: Vec<MonitorGeometry>) -> Spawned {
    let (cmd_tx, cmd_rx) = mpsc::channel::<PresenterCommand>(16);
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(presenter::run(
        cmd_rx,
        event_tx,
        StaticMonitors(monitors),
        |_: &MonitorGeometry| HeadlessSurface::default(),
        0.05,
        cancel.clone(),
    ));
    (PresenterHandle::new(cmd_tx), event_rx, cancel, task)
}

fn start_session(
    settings: Settings,
    monitors: Vec<MonitorGeometry>,
) -> (Session, mpsc::UnboundedReceiver<PresenterEvent>, CancellationToken) {
    let (handle, events, cancel, _task) = spawn_presenter(monitors);
    (Session::new(settings, handle), events, cancel)
}

fn quick_settings() -> Settings {
    Settings {
        fade_ms: 0,
        monitor_index: 1,
        ..Settings::default()
    }
}

fn monitors() -> Vec<MonitorGeometry> {
    vec![
        MonitorGeometry::new(0, 0, 800, 600).hosting_control(),
        MonitorGeometry::new(800, 0, 640, 480),
    ]
}

fn write_images(dir: &Path, names: &[&str]) {
    for (idx, name) in names.iter().enumerate() {
        let shade = (idx as u8).wrapping_mul(40);
        RgbImage::from_pixel(32, 24, Rgb([shade, 100, 200]))
            .save(dir.join(name))
            .unwrap();
    }
}

fn selected_name(session: &Session) -> Option<String> {
    session
        .collection()
        .selected()
        .map(|item| item.display_name().into_owned())
}

async fn wait_displayed(events: &mut mpsc::UnboundedReceiver<PresenterEvent>, path: &Path) {
    loop {
        let event = tokio::time::timeout(WAIT, events.recv())
            .await
            .expect("timeout waiting for presenter event")
            .expect("presenter stopped");
        if event == PresenterEvent::Displayed(path.to_path_buf()) {
            return;
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scan_then_navigate_with_clamped_bounds() {
    let tmp = tempdir().unwrap();
    write_images(tmp.path(), &["b.png", "a.jpg", "c.bmp"]);
    std::fs::write(tmp.path().join("readme.txt"), b"not an image").unwrap();

    let (mut session, _events, cancel) = start_session(quick_settings(), monitors());
    let count = session.open_folder(tmp.path()).await.unwrap();
    assert_eq!(count, 3);
    assert_eq!(session.status(), "Loaded: 3 items");
    let names: Vec<String> = session
        .collection()
        .as_slice()
        .iter()
        .map(|i| i.display_name().into_owned())
        .collect();
    assert_eq!(names, ["a.jpg", "b.png", "c.bmp"]);
    assert_eq!(session.collection().selected_index(), Some(0));

    assert_eq!(session.previous().await.unwrap(), None);
    assert_eq!(selected_name(&session).as_deref(), Some("a.jpg"));

    session.select(0).await.unwrap();
    session.next().await.unwrap();
    let landed = session.next().await.unwrap();
    assert_eq!(landed, Some(tmp.path().join("c.bmp")));
    assert_eq!(session.next().await.unwrap(), None);
    assert_eq!(session.collection().selected_index(), Some(2));

    assert_eq!(session.select(10).await.unwrap(), None);
    assert_eq!(session.collection().selected_index(), Some(2));
    cancel.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sort_changes_keep_the_selected_item() {
    let tmp = tempdir().unwrap();
    write_images(tmp.path(), &["a.png", "b.png", "c.png"]);
    let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    for (name, offset) in [("a.png", 30), ("b.png", 10), ("c.png", 20)] {
        let file = std::fs::File::options()
            .write(true)
            .open(tmp.path().join(name))
            .unwrap();
        file.set_modified(base + Duration::from_secs(offset)).unwrap();
    }

    let (mut session, _events, cancel) = start_session(quick_settings(), monitors());
    session.open_folder(tmp.path()).await.unwrap();
    session.select(1).await.unwrap();
    assert_eq!(selected_name(&session).as_deref(), Some("b.png"));

    let order = |s: &Session| -> Vec<String> {
        s.collection()
            .as_slice()
            .iter()
            .map(|i| i.display_name().into_owned())
            .collect()
    };

    session.set_sort(SortKey::DateModified, false);
    assert_eq!(order(&session), ["b.png", "c.png", "a.png"]);
    assert_eq!(selected_name(&session).as_deref(), Some("b.png"));

    session.set_sort(SortKey::DateModified, false);
    assert_eq!(order(&session), ["b.png", "c.png", "a.png"]);

    session.set_sort(SortKey::FileName, true);
    assert_eq!(order(&session), ["c.png", "b.png", "a.png"]);
    assert_eq!(session.collection().selected_index(), Some(1));
    assert_eq!(session.settings().sort_key, SortKey::FileName);
    assert!(session.settings().sort_descending);
    cancel.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn show_black_and_unblack_follow_the_selection() {
    let tmp = tempdir().unwrap();
    write_images(tmp.path(), &["1.png", "2.png", "3.png"]);
    let first = tmp.path().join("1.png");
    let second = tmp.path().join("2.png");
    let third = tmp.path().join("3.png");

    let (mut session, mut events, cancel) = start_session(quick_settings(), monitors());
    session.open_folder(tmp.path()).await.unwrap();

    let geometry = session.set_show(true).await.unwrap().unwrap();
    assert_eq!(geometry.left, 800);
    wait_displayed(&mut events, &first).await;

    session.set_black(true).await.unwrap();
    session.next().await.unwrap();
    session.next().await.unwrap();
    assert_eq!(selected_name(&session).as_deref(), Some("3.png"));
    let status = session.presenter().status().await.unwrap();
    assert_eq!(status.phase, PresenterPhase::Black);
    assert_eq!(status.front.as_deref(), Some(first.as_path()));

    session.set_black(false).await.unwrap();
    wait_displayed(&mut events, &third).await;
    let status = session.presenter().status().await.unwrap();
    assert_eq!(status.phase, PresenterPhase::Showing);
    assert_eq!(status.front, Some(third.clone()));

    session.previous().await.unwrap();
    wait_displayed(&mut events, &second).await;

    session.rotate_clockwise().await.unwrap();
    wait_displayed(&mut events, &second).await;
    assert_eq!(
        session.collection().selected().map(|i| i.rotation()),
        Some(Rotation::Cw90)
    );

    session.set_show(false).await.unwrap();
    assert!(!session.is_showing());
    let status = session.presenter().status().await.unwrap();
    assert_eq!(status.phase, PresenterPhase::Off);
    cancel.cancel();
}

fn three_monitors() -> Vec<MonitorGeometry> {
    let mut list = monitors();
    list.push(MonitorGeometry::new(1440, 0, 320, 240));
    list
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn monitor_changes_retarget_only_while_showing() {
    let (mut session, _events, cancel) = start_session(quick_settings(), three_monitors());
    assert_eq!(session.set_monitor(2).await.unwrap(), None);
    assert_eq!(session.settings().monitor_index, 2);

    let geometry = session.set_show(true).await.unwrap().unwrap();
    assert_eq!(geometry.left, 1440);
    let geometry = session.set_monitor(1).await.unwrap().unwrap();
    assert_eq!(geometry.left, 800);
    let status = session.presenter().status().await.unwrap();
    assert_eq!(status.monitor.map(|(idx, _)| idx), Some(1));
    cancel.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn control_host_and_unknown_monitors_are_refused() {
    let (mut session, _events, cancel) = start_session(quick_settings(), three_monitors());
    for index in [0, 7] {
        assert!(matches!(
            session.set_monitor(index).await,
            Err(Error::MonitorUnavailable { index: i }) if i == index
        ));
        assert_eq!(session.settings().monitor_index, 1);
    }

    session.set_show(true).await.unwrap();
    assert!(session.set_monitor(0).await.is_err());
    let status = session.presenter().status().await.unwrap();
    assert_eq!(status.monitor.map(|(idx, _)| idx), Some(1));
    cancel.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn show_skips_a_saved_control_host() {
    let settings = Settings {
        monitor_index: 0,
        ..quick_settings()
    };
    let (mut session, _events, cancel) = start_session(settings, monitors());
    let geometry = session.set_show(true).await.unwrap().unwrap();
    assert!(!geometry.hosts_control);
    assert_eq!(geometry.left, 800);
    assert_eq!(session.settings().monitor_index, 1);
    cancel.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn show_with_only_the_control_display_fails() {
    let solo = vec![MonitorGeometry::new(0, 0, 800, 600).hosting_control()];
    let (mut session, _events, cancel) = start_session(quick_settings(), solo);
    assert!(matches!(
        session.set_show(true).await,
        Err(Error::NoMonitors)
    ));
    assert!(!session.is_showing());
    assert_eq!(
        session.presenter().status().await.unwrap().phase,
        PresenterPhase::Off
    );
    cancel.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn folder_load_finishes_after_presenter_stops() {
    let tmp = tempdir().unwrap();
    write_images(tmp.path(), &["a.png", "b.png", "c.png"]);
    let (handle, _events, cancel, task) = spawn_presenter(monitors());
    let settings = Settings {
        sort_descending: true,
        ..quick_settings()
    };
    let mut session = Session::new(settings, handle);
    session.set_show(true).await.unwrap();
    cancel.cancel();
    task.await.unwrap().unwrap();

    let count = session.open_folder(tmp.path()).await.unwrap();
    assert_eq!(count, 3);
    assert_eq!(session.status(), "Loaded: 3 items");
    let names: Vec<String> = session
        .collection()
        .as_slice()
        .iter()
        .map(|i| i.display_name().into_owned())
        .collect();
    assert_eq!(names, ["c.png", "b.png", "a.png"]);
    assert_eq!(selected_name(&session).as_deref(), Some("a.png"));
    assert!(matches!(session.previous().await, Err(Error::PresenterClosed)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_folder_reports_load_error() {
    let tmp = tempdir().unwrap();
    let (mut session, _events, cancel) = start_session(quick_settings(), monitors());
    let missing: PathBuf = tmp.path().join("nope");
    let err = session.open_folder(&missing).await.unwrap_err();
    assert!(matches!(err, Error::DirectoryUnavailable { .. }));
    assert!(session.status().starts_with("Load error: "), "{}", session.status());
    assert!(session.collection().is_empty());
    assert_eq!(session.settings().last_folder, Some(missing));
    cancel.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn show_without_monitors_surfaces_the_failure() {
    let (mut session, _events, cancel) = start_session(quick_settings(), Vec::new());
    assert!(matches!(
        session.set_show(true).await,
        Err(Error::NoMonitors)
    ));
    assert!(!session.is_showing());
    cancel.cancel();
}
