use crate::*;
use crate::eventsim::notify::Notification;
use crate::input::document::{self, FormatError, SimulationRecord};
use crate::output::logger::MessageKind;
use crate::railway::infrastructure::*;
use crate::railway::route::*;
use crate::railway::topology::Side;
use crate::railway::trains::*;
use crate::simulation::{LoadError, SaveError};
use serde_json::{json, Map};
use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;

fn item(id: ElementId, kind: ElementKind, o: (f64, f64), e: (f64, f64)) -> TrackElement {
    TrackElement::new(id, kind, Point::new(o.0, o.1), Point::new(e.0, e.1))
}

/// A single junction: signal 2 leads over points 4 either to signal 6
/// (route 1, normal) or to signal 9 (route 2, reverse). One train on the
/// approach, running service S1 from station STN.
fn junction_record() -> SimulationRecord {
    use maplit::*;

    let mut station = item(11, ElementKind::Place, (100.0, 100.0), (100.0, 100.0));
    station.place_code = Some("STN".to_string());
    station.name = "Station".to_string();

    let mut r1 = Route::new(1, 2, 6);
    r1.initial_state = RouteState::Deactivated;
    let mut r2 = Route::new(2, 2, 9);
    r2.directions.insert(4, PointsDirection::Reverse);

    let mut record = SimulationRecord {
        track_items: vec![
            item(1, ElementKind::End, (0.0, 0.0), (0.0, 0.0)),
            item(2, ElementKind::Signal, (0.0, 0.0), (5.0, 0.0)),
            item(3, ElementKind::Line, (5.0, 0.0), (20.0, 0.0)),
            item(4, ElementKind::Points { reverse: Point::new(30.0, 10.0) }, (20.0, 0.0), (30.0, 0.0)),
            item(5, ElementKind::Line, (30.0, 0.0), (45.0, 0.0)),
            item(6, ElementKind::Signal, (45.0, 0.0), (50.0, 0.0)),
            item(7, ElementKind::Line, (45.0, 10.0), (30.0, 10.0)),
            item(8, ElementKind::End, (50.0, 0.0), (50.0, 0.0)),
            item(9, ElementKind::Signal, (45.0, 10.0), (50.0, 10.0)),
            item(10, ElementKind::End, (50.0, 10.0), (50.0, 10.0)),
            station,
        ],
        routes: vec![r1, r2],
        train_types: btreemap!{
            "EMU".to_string() => TrainType {
                code: "EMU".to_string(),
                description: "Electric multiple unit".to_string(),
                max_speed: Some(40.0),
                length: Some(70.0),
                extra: Map::new(),
            },
        },
        services: btreemap!{
            "S1".to_string() => Service {
                service_code: "S1".to_string(),
                description: "Stopping service".to_string(),
                lines: vec![ServiceLine {
                    place_code: "STN".to_string(),
                    track_code: None,
                    scheduled_arrival_time: String::new(),
                    scheduled_departure_time: "06:10:00".to_string(),
                    extra: Map::new(),
                }],
                extra: Map::new(),
            },
        },
        trains: vec![Train {
            service_code: "S1".to_string(),
            train_type_code: "EMU".to_string(),
            appear_time: Some("06:00:00".to_string()),
            train_head: Some(Position { track_item: 3, previous_item: Some(2), position_on_item: 1.0 }),
            extra: Map::new(),
        }],
        ..Default::default()
    };
    record.options.title = "Junction".to_string();
    record
}

fn listen(sim: &mut Simulation) -> Rc<RefCell<Vec<Notification>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let l = log.clone();
    sim.subscribe(Box::new(move |n| l.borrow_mut().push(n.clone())));
    log
}

#[test]
fn test_load_builds_graph_and_routes() {
    let sim = Simulation::from_record(junction_record()).unwrap();
    let inf = sim.infrastructure();
    assert_eq!(inf.get(4).unwrap().links, Links { previous: Some(3), next: Some(5), reverse: Some(7) });
    assert_eq!(inf.get(7).unwrap().links.previous, Some(9));
    assert_eq!(inf.place("STN").map(|e| e.id), Some(11));
    assert_eq!(inf.get(11).unwrap().links, Links::default());

    let items = sim.routes().map(|r| r.items.to_vec()).collect::<Vec<_>>();
    assert_eq!(items, vec![vec![3, 4, 5], vec![3, 4, 7]]);
    assert!(sim.is_running());
    assert_eq!(sim.current_time().to_string(), "06:00:00");

    let texts = sim.message_logger().messages.iter().map(|m| m.msg_text.as_str()).collect::<Vec<_>>();
    assert_eq!(texts.first(), Some(&"Simulation initializing"));
    assert_eq!(texts.last(), Some(&"Simulation loaded"));
}

#[test]
fn test_conflict_then_force() {
    let mut sim = Simulation::from_record(junction_record()).unwrap();
    let events = listen(&mut sim);

    sim.select_signal(2, false, false).unwrap();
    sim.select_signal(6, false, false).unwrap();
    assert_eq!(sim.interlocking().route(1).unwrap().state(), RouteState::Activated);
    assert!(events.borrow().contains(&Notification::RouteActivated(1)));

    events.borrow_mut().clear();
    sim.select_signal(2, false, false).unwrap();
    sim.select_signal(9, false, false).unwrap();
    assert!(events.borrow().contains(&Notification::ConflictingRoute(2)));
    assert_eq!(sim.interlocking().route(2).unwrap().state(), RouteState::Deactivated);
    assert_eq!(sim.selected_signal(), None);
    assert!(!sim.interlocking().signal(2).unwrap().selected);
    assert!(!sim.interlocking().signal(9).unwrap().selected);
    let last = sim.message_logger().last().unwrap();
    assert_eq!((last.msg_type, last.msg_text.as_str()), (MessageKind::PlayerWarning, "Conflicting route"));
    assert_eq!(sim.message_logger().warnings().count(), 1);

    sim.select_signal(2, false, false).unwrap();
    sim.select_signal(9, true, true).unwrap();
    assert_eq!(sim.interlocking().route(2).unwrap().state(), RouteState::Persistent);

    sim.deactivate_route(6).unwrap();
    assert_eq!(sim.interlocking().route(1).unwrap().state(), RouteState::Activated);

    // Both routes leave signal 2; each release request frees one of them.
    sim.deactivate_route(2).unwrap();
    assert_eq!(sim.interlocking().route(2).unwrap().state(), RouteState::Deactivated);
    assert_eq!(sim.interlocking().route(1).unwrap().state(), RouteState::Activated);
    sim.deactivate_route(2).unwrap();
    assert!(sim.routes().all(|r| !r.is_active()));
    assert_eq!(sim.select_signal(3, false, false), Err(railway::interlocking::InterlockingError::NotASignal(3)));
}

#[test]
fn test_no_route_moves_selection() {
    let mut sim = Simulation::from_record(junction_record()).unwrap();
    let events = listen(&mut sim);
    sim.select_signal(6, false, false).unwrap();
    sim.select_signal(2, false, false).unwrap();
    assert!(events.borrow().contains(&Notification::NoRouteBetweenSignals(6, 2)));
    assert_eq!(sim.selected_signal(), Some(2));
    assert!(!sim.interlocking().signal(6).unwrap().selected);
    assert_eq!(sim.message_logger().last().unwrap().msg_text, "No route between signals");
}

#[test]
fn test_save_and_reload() {
    let mut sim = Simulation::from_record(junction_record()).unwrap();
    sim.select_signal(2, false, false).unwrap();
    sim.select_signal(6, true, false).unwrap();
    sim.select_signal(9, false, false).unwrap();
    assert_eq!(sim.selected_signal(), Some(9));
    sim.set_time_factor(2);
    sim.tick();

    match sim.save(Cursor::new(Vec::new())) {
        Err(SaveError::NotPaused) => {}
        other => panic!("saved a running simulation: {:?}", other.map(|_| ())),
    }
    sim.pause(true);
    let data = sim.save(Cursor::new(Vec::new())).unwrap().into_inner();

    let loaded = Simulation::load(&data).unwrap();
    assert_eq!(loaded.infrastructure().ids(), sim.infrastructure().ids());
    for e in sim.infrastructure().iter() {
        let l = loaded.infrastructure().get(e.id).unwrap();
        assert_eq!(l.links, e.links);
        assert_eq!(l.kind, e.kind);
        assert_eq!((l.origin, l.end), (e.origin, e.end));
    }
    assert_eq!(loaded.interlocking().route(1).unwrap().state(), RouteState::Persistent);
    assert_eq!(loaded.interlocking().route(2).unwrap().state(), RouteState::Deactivated);
    assert_eq!(loaded.interlocking().signal(2).unwrap().next_active_route, Some(1));
    assert_eq!(loaded.interlocking().signal(6).unwrap().previous_active_route, Some(1));
    assert_eq!(loaded.selected_signal(), None);
    assert!(!loaded.interlocking().signal(9).unwrap().selected);

    assert_eq!(loaded.current_time(), sim.current_time());
    assert_eq!(loaded.current_time().to_string(), "06:00:01");
    assert_eq!(loaded.time_factor(), 2);
    assert_eq!(loaded.options().title, "Junction");
    assert_eq!(loaded.trains()[0].train_head, sim.trains()[0].train_head);
    assert_eq!(loaded.services()["S1"].lines.len(), 1);
}

#[test]
fn test_plain_json_and_unknown_types() {
    let doc = document::encode(&junction_record()).unwrap();
    let plain = serde_json::to_vec(&doc).unwrap();
    assert_eq!(Simulation::load(&plain).unwrap().infrastructure().len(), 11);

    let mut bad = doc.clone();
    bad["trackItems"]["3"]["__type__"] = json!("BridgeItem");
    match Simulation::from_document(bad) {
        Err(LoadError::Format(FormatError::UnknownType(t))) => assert_eq!(t, "BridgeItem"),
        other => panic!("unexpected result {:?}", other.map(|_| ())),
    }

    let mut bad = doc;
    bad["trains"][0]["serviceCode"] = json!("S9");
    match Simulation::from_document(bad) {
        Err(LoadError::Format(FormatError::Train(TrainError::UnknownService(s)))) => assert_eq!(s, "S9"),
        other => panic!("unexpected result {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_unlinked_items_fail_loading() {
    let mut record = junction_record();
    record.track_items.retain(|e| e.id != 8);
    match Simulation::from_record(record) {
        Err(LoadError::Linkage(report)) => {
            assert_eq!(report.unlinked.len(), 1);
            assert_eq!(report.unlinked[0].id, 6);
            assert_eq!(report.unlinked[0].side, Side::Next);
            assert_eq!(report.unlinked[0].at, Point::new(50.0, 0.0));
        }
        other => panic!("unexpected result {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_options_and_score() {
    let mut record = junction_record();
    record.options.time_factor = 15;
    record.options.current_score = 40;
    let mut sim = Simulation::from_record(record).unwrap();
    assert_eq!(sim.time_factor(), 10);
    assert_eq!(sim.options().time_factor, 10);
    assert_eq!(sim.option("timeFactor"), Some(json!(10)));
    assert_eq!(sim.score(), 40);
    assert_eq!(sim.option("noSuchOption"), None);

    sim.set_option("title", json!("Junction at dusk")).unwrap();
    assert_eq!(sim.option("title"), Some(json!("Junction at dusk")));
    assert!(sim.set_option("timeFactor", json!("fast")).is_err());
    assert_eq!(sim.options().title, "Junction at dusk");

    let inf = sim.infrastructure();
    assert!(inf.is_signal(9));
    assert!(!inf.is_signal(4));
    assert!(!inf.is_signal(99));
}

#[test]
fn test_ticks_follow_time_factor() {
    let mut sim = Simulation::from_record(junction_record()).unwrap();
    let events = listen(&mut sim);
    let start = sim.current_time();

    assert!(sim.tick());
    assert_eq!(sim.current_time().msecs() - start.msecs(), 5 * 500);
    assert_eq!(*events.borrow(), vec![
        Notification::TimeChanged(start.add_msecs(2500)),
        Notification::TimeElapsed(2.5),
    ]);

    assert_eq!(sim.set_time_factor(0), 0);
    assert_eq!(sim.options().time_factor, 0);
    assert!(!sim.tick());
    assert_eq!(sim.advance(5000.0), 0);

    assert_eq!(sim.set_time_factor(25), 10);
    assert_eq!(sim.advance(1000.0), 2);
    assert_eq!(sim.current_time(), start.add_msecs(2500 + 2 * 5000));

    sim.notify_train_status(0);
    assert_eq!(events.borrow().last(), Some(&Notification::TrainStatusChanged(0)));
}
