use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use dialpad_gpio::adc::{AdcConfig, AdcDriver};
use dialpad_gpio::keypad::{
    ConfigError, DialPad, DialPadConfig, DialPadError, Key, KeyEvent, ListenerSlot, PadLine, PadState,
    RangeTable,
};
use dialpad_gpio::sim::{PinMode, SimAdc, SimLine, SimPin, SimScheduler, REST_LEVEL};
use dialpad_gpio::{GpioError, GpioResult, IrqHandler};

type EventLog = Rc<RefCell<Vec<(Duration, KeyEvent)>>>;

struct Rig {
    sched: SimScheduler,
    line: SimLine,
    ladder: SimPin,
    pad: DialPad,
    events: EventLog,
}

fn ms(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

fn level(key: Key) -> u16 {
    RangeTable::default().nominal(key).unwrap()
}

fn record(pad: &DialPad, sched: &SimScheduler, events: &EventLog) {
    let (s, e) = (sched.clone(), events.clone());
    pad.on_pressed(move |key| e.borrow_mut().push((s.now(), KeyEvent::Pressed(key))));
    let (s, e) = (sched.clone(), events.clone());
    pad.on_released(move |key| e.borrow_mut().push((s.now(), KeyEvent::Released(key))));
    let (s, e) = (sched.clone(), events.clone());
    pad.on_hold(move |key| e.borrow_mut().push((s.now(), KeyEvent::Hold(key))));
}

fn rig_with(sched: SimScheduler, config: DialPadConfig) -> Rig {
    let _ = pretty_env_logger::try_init();
    let line = SimLine::new(sched.clone());
    let ladder = SimPin::new();
    let pad = DialPad::new(
        PadLine { adc: Box::new(line.adc()), irq: Box::new(line.irq()) },
        Box::new(ladder.clone()),
        Rc::new(sched.clone()),
        config,
    ).unwrap();
    let events = EventLog::default();
    record(&pad, &sched, &events);
    Rig { sched, line, ladder, pad, events }
}

fn rig() -> Rig {
    rig_with(SimScheduler::new(), DialPadConfig::default())
}

impl Rig {
    fn events(&self) -> Vec<(Duration, KeyEvent)> {
        self.events.borrow().clone()
    }

    fn keys(&self) -> Vec<KeyEvent> {
        self.events.borrow().iter().map(|(_, event)| *event).collect()
    }

    fn press(&self, key: Key) {
        self.line.press(level(key));
    }

    fn assert_idle(&self) {
        assert_eq!(self.pad.state(), PadState::Idle);
        assert!(self.line.interrupt_enabled());
        assert!(!self.line.adc_enabled());
        assert_eq!(self.ladder.mode(), Some(PinMode::Input));
    }
}

#[test]
fn starts_idle_with_interrupt_armed() {
    let rig = rig();
    rig.assert_idle();
    assert_eq!(rig.pad.current_key(), Key::None);
    assert_eq!(rig.line.adc_config(), Some(AdcConfig::DIAL_PAD));
    assert_eq!(rig.line.mode(), Some(PinMode::Input));
    assert_eq!(rig.sched.pending(), 0);
}

#[test]
fn press_reports_once_and_arms_hold() {
    let rig = rig();
    rig.press(Key::Key5);
    rig.sched.advance(ms(99));
    assert!(rig.events().is_empty());
    assert_eq!(rig.pad.state(), PadState::DebounceWait);
    assert!(!rig.line.interrupt_enabled());
    assert!(rig.ladder.is_driven_high());

    rig.sched.advance(ms(1));
    assert_eq!(rig.events(), [(ms(100), KeyEvent::Pressed(Key::Key5))]);
    assert_eq!(rig.line.conversions(), 3);
    assert_eq!(rig.pad.current_key(), Key::Key5);
    assert_eq!(rig.pad.state(), PadState::RecheckWait);
    assert!(rig.pad.hold_pending());
    assert!(rig.line.adc_enabled());
}

#[test]
fn holding_fires_hold_once_without_rearming() {
    let rig = rig();
    rig.press(Key::Key7);
    rig.sched.advance(ms(2000));

    assert_eq!(
        rig.events(),
        [
            (ms(100), KeyEvent::Pressed(Key::Key7)),
            (ms(600), KeyEvent::Hold(Key::Key7)),
        ],
    );
    assert!(!rig.pad.hold_pending());
    assert_eq!(rig.pad.state(), PadState::RecheckWait);
}

#[test]
fn release_reports_once_and_returns_to_idle() {
    let rig = rig();
    rig.press(Key::KeyS);
    rig.sched.advance(ms(100));
    rig.line.release();
    rig.sched.advance(ms(300));

    assert_eq!(
        rig.events(),
        [
            (ms(100), KeyEvent::Pressed(Key::KeyS)),
            (ms(400), KeyEvent::Released(Key::KeyS)),
        ],
    );
    assert_eq!(rig.pad.current_key(), Key::None);
    assert!(!rig.pad.hold_pending());
    rig.assert_idle();

    rig.sched.advance(ms(1000));
    assert_eq!(rig.events().len(), 2);
    assert_eq!(rig.sched.pending(), 0);
}

#[test]
fn switching_keys_releases_then_presses_and_rearms_hold() {
    let rig = rig();
    rig.press(Key::Key1);
    rig.sched.advance(ms(100));
    rig.line.set_level(level(Key::Key2));
    rig.sched.advance(ms(300));

    assert_eq!(
        rig.keys(),
        [
            KeyEvent::Pressed(Key::Key1),
            KeyEvent::Released(Key::Key1),
            KeyEvent::Pressed(Key::Key2),
        ],
    );
    assert!(rig.pad.hold_pending());

    rig.sched.advance(ms(500));
    assert_eq!(rig.events().last(), Some(&(ms(900), KeyEvent::Hold(Key::Key2))));
    assert!(!rig.keys().contains(&KeyEvent::Hold(Key::Key1)));
}

#[test]
fn a_second_press_after_release_starts_over() {
    let rig = rig();
    rig.press(Key::Key0);
    rig.sched.advance(ms(100));
    rig.line.release();
    rig.sched.advance(ms(300));
    rig.assert_idle();

    rig.press(Key::KeyR);
    rig.sched.advance(ms(100));
    assert_eq!(
        rig.keys(),
        [
            KeyEvent::Pressed(Key::Key0),
            KeyEvent::Released(Key::Key0),
            KeyEvent::Pressed(Key::KeyR),
        ],
    );
    assert_eq!(rig.line.edges(), 2);
}

#[test]
fn stray_readings_lose_the_vote() {
    let rig = rig();
    rig.line.queue_samples([17, level(Key::Key4), level(Key::Key4)]);
    rig.press(Key::Key4);
    rig.sched.advance(ms(100));
    assert_eq!(rig.keys(), [KeyEvent::Pressed(Key::Key4)]);
}

#[test]
fn tied_vote_goes_to_the_first_declared_key() {
    let rig = rig();
    rig.line.queue_samples([level(Key::Key9), 17, level(Key::Key3)]);
    rig.press(Key::Key9);
    rig.sched.advance(ms(100));
    assert_eq!(rig.keys(), [KeyEvent::Pressed(Key::Key3)]);
}

#[test]
fn invalid_cycle_keeps_polling_without_reporting() {
    let rig = rig();
    rig.line.queue_samples([17, 18, level(Key::Key6)]);
    rig.press(Key::Key6);
    rig.sched.advance(ms(100));

    assert!(rig.events().is_empty());
    assert_eq!(rig.pad.current_key(), Key::Invalid);
    assert_eq!(rig.pad.state(), PadState::RecheckWait);
    assert!(!rig.pad.hold_pending());

    rig.sched.advance(ms(300));
    assert_eq!(rig.events(), [(ms(400), KeyEvent::Pressed(Key::Key6))]);
}

#[test]
fn rest_reading_anywhere_up_to_the_converter_maximum_releases() {
    for rest in [300, AdcConfig::DIAL_PAD.resolution.max_value()] {
        let rig = rig();
        rig.press(Key::Key5);
        rig.sched.advance(ms(100));
        rig.line.set_level(rest);
        rig.sched.advance(ms(300));

        assert_eq!(
            rig.events(),
            [
                (ms(100), KeyEvent::Pressed(Key::Key5)),
                (ms(400), KeyEvent::Released(Key::Key5)),
            ],
            "rest level {}",
            rest,
        );
        assert_eq!(rig.pad.current_key(), Key::None);
        rig.assert_idle();
    }
}

#[test]
fn stray_conversion_complete_is_ignored_outside_sampling() {
    let rig = rig();
    rig.line.raise_conversion_complete();
    rig.sched.run_pending();
    rig.assert_idle();
    assert_eq!(rig.line.conversions(), 0);

    rig.press(Key::Key2);
    rig.sched.advance(ms(10));
    assert_eq!(rig.pad.state(), PadState::DebounceWait);
    rig.line.raise_conversion_complete();
    rig.sched.run_pending();
    assert_eq!(rig.pad.state(), PadState::DebounceWait);
    assert_eq!(rig.line.conversions(), 1);
    assert!(rig.events().is_empty());

    rig.sched.advance(ms(90));
    assert_eq!(rig.events(), [(ms(100), KeyEvent::Pressed(Key::Key2))]);
    assert_eq!(rig.pad.state(), PadState::RecheckWait);
    rig.line.raise_conversion_complete();
    rig.sched.run_pending();
    assert_eq!(rig.pad.state(), PadState::RecheckWait);
    assert_eq!(rig.pad.current_key(), Key::Key2);
    assert_eq!(rig.line.conversions(), 3);
    assert_eq!(rig.events(), [(ms(100), KeyEvent::Pressed(Key::Key2))]);
}

#[test]
fn extra_edges_are_ignored_until_idle() {
    let rig = rig();
    rig.press(Key::Key9);
    // Runs right after the first edge starts sampling, with its conversion still in flight.
    rig.line.raise_edge();
    rig.sched.run_pending();
    assert_eq!(rig.line.edges(), 2);
    assert_eq!(rig.line.conversions(), 1);
    assert_eq!(rig.pad.state(), PadState::DebounceWait);
    assert!(rig.events().is_empty());

    rig.sched.advance(ms(100));
    assert_eq!(rig.events(), [(ms(100), KeyEvent::Pressed(Key::Key9))]);
    rig.line.raise_edge();
    rig.sched.run_pending();
    assert_eq!(rig.pad.state(), PadState::RecheckWait);
    assert_eq!(rig.line.conversions(), 3);
    assert_eq!(rig.events(), [(ms(100), KeyEvent::Pressed(Key::Key9))]);
}

#[test]
fn glitch_edge_returns_to_idle_quietly() {
    let rig = rig();
    rig.line.press(REST_LEVEL);
    rig.sched.advance(ms(100));
    assert!(rig.events().is_empty());
    assert_eq!(rig.line.conversions(), 3);
    rig.assert_idle();
}

#[test]
fn legacy_notifications_report_every_change() {
    let config = DialPadConfig { legacy_notifications: true, ..Default::default() };
    let rig = rig_with(SimScheduler::new(), config);
    rig.line.queue_samples([17, 18, 19]);
    rig.press(Key::Key8);
    rig.sched.advance(ms(400));
    rig.line.release();
    rig.sched.advance(ms(300));

    assert_eq!(
        rig.keys(),
        [
            KeyEvent::Released(Key::None),
            KeyEvent::Pressed(Key::Invalid),
            KeyEvent::Released(Key::Invalid),
            KeyEvent::Pressed(Key::Key8),
            KeyEvent::Released(Key::Key8),
        ],
    );
}

#[test]
fn hold_fires_within_the_tolerance_window() {
    let rig = rig_with(SimScheduler::new().with_late_firing(), DialPadConfig::default());
    rig.press(Key::Key2);
    rig.sched.advance(ms(1000));

    let events = rig.events();
    let (pressed_at, _) = events[0];
    let (hold_at, hold) = events[1];
    assert_eq!(events[0].1, KeyEvent::Pressed(Key::Key2));
    assert_eq!(hold, KeyEvent::Hold(Key::Key2));
    let delay = hold_at - pressed_at;
    assert!(delay >= ms(500) && delay <= ms(520), "hold after {:?}", delay);
}

#[test]
fn no_hold_timer_without_hold_listener() {
    let rig = rig();
    rig.pad.detach(ListenerSlot::Hold);
    rig.press(Key::Key3);
    rig.sched.advance(ms(1000));
    assert!(!rig.pad.hold_pending());
    assert_eq!(rig.keys(), [KeyEvent::Pressed(Key::Key3)]);
}

#[test]
fn detaching_one_listener_keeps_the_others() {
    let rig = rig();
    rig.pad.detach(ListenerSlot::Pressed);
    rig.press(Key::Key3);
    rig.sched.advance(ms(100));
    rig.line.release();
    rig.sched.advance(ms(300));
    assert_eq!(rig.keys(), [KeyEvent::Released(Key::Key3)]);
}

#[test]
fn listener_may_call_back_into_the_pad() {
    let sched = SimScheduler::new();
    let line = SimLine::new(sched.clone());
    let pad = Rc::new(DialPad::new(
        PadLine { adc: Box::new(line.adc()), irq: Box::new(line.irq()) },
        Box::new(SimPin::new()),
        Rc::new(sched.clone()),
        DialPadConfig::default(),
    ).unwrap());

    let seen = Rc::new(RefCell::new(Vec::new()));
    let (weak, seen_clone) = (Rc::downgrade(&pad), seen.clone());
    pad.on_pressed(move |key| {
        if let Some(pad) = weak.upgrade() {
            seen_clone.borrow_mut().push((key, pad.current_key(), pad.state()));
            pad.detach(ListenerSlot::Pressed);
        }
    });

    line.press(level(Key::Key9));
    sched.advance(ms(100));
    line.release();
    sched.advance(ms(300));
    line.press(level(Key::Key1));
    sched.advance(ms(100));

    assert_eq!(*seen.borrow(), [(Key::Key9, Key::Key9, PadState::RecheckWait)]);
}

#[derive(Debug)]
struct FlakyAdc {
    inner: SimAdc,
    conversions_left: Rc<Cell<usize>>,
}

impl AdcDriver for FlakyAdc {
    fn configure(&mut self, config: AdcConfig) -> GpioResult<()> {
        self.inner.configure(config)
    }

    fn enable(&mut self) -> GpioResult<()> {
        self.inner.enable()
    }

    fn disable(&mut self) -> GpioResult<()> {
        self.inner.disable()
    }

    fn start_conversion(&mut self) -> GpioResult<()> {
        match self.conversions_left.get() {
            0 => Err(GpioError::Other("converter stalled".to_string())),
            n => {
                self.conversions_left.set(n - 1);
                self.inner.start_conversion()
            }
        }
    }

    fn read_result(&self) -> GpioResult<u16> {
        self.inner.read_result()
    }

    fn on_conversion_complete(&mut self, handler: IrqHandler) -> GpioResult<()> {
        self.inner.on_conversion_complete(handler)
    }
}

#[test]
fn peripheral_failure_degrades_to_no_key() {
    let _ = pretty_env_logger::try_init();
    let sched = SimScheduler::new();
    let line = SimLine::new(sched.clone());
    let ladder = SimPin::new();
    let conversions_left = Rc::new(Cell::new(3));
    let adc = FlakyAdc { inner: line.adc(), conversions_left: conversions_left.clone() };
    let pad = DialPad::new(
        PadLine { adc: Box::new(adc), irq: Box::new(line.irq()) },
        Box::new(ladder.clone()),
        Rc::new(sched.clone()),
        DialPadConfig::default(),
    ).unwrap();
    let events = EventLog::default();
    record(&pad, &sched, &events);

    line.press(level(Key::Key5));
    sched.advance(ms(300));

    let keys: Vec<_> = events.borrow().iter().map(|(_, event)| *event).collect();
    assert_eq!(keys, [KeyEvent::Pressed(Key::Key5), KeyEvent::Released(Key::Key5)]);
    assert_eq!(pad.state(), PadState::Idle);
    assert!(line.interrupt_enabled());
    assert!(!pad.hold_pending());

    conversions_left.set(usize::MAX);
    line.press(level(Key::Key5));
    sched.advance(ms(100));
    assert_eq!(pad.current_key(), Key::Key5);
}

#[test]
fn dropping_the_pad_cancels_its_timers() {
    let rig = rig();
    rig.press(Key::Key1);
    rig.sched.advance(ms(100));
    assert!(rig.sched.pending() > 0);

    let Rig { sched, line, events, pad, .. } = rig;
    drop(pad);
    assert_eq!(sched.pending(), 0);

    line.release();
    sched.advance(ms(1000));
    assert_eq!(events.borrow().len(), 1);
}

#[test]
fn rejects_invalid_config() {
    let line = SimLine::new(SimScheduler::new());
    let config = DialPadConfig { samples_per_cycle: 0, ..Default::default() };
    let result = DialPad::new(
        PadLine { adc: Box::new(line.adc()), irq: Box::new(line.irq()) },
        Box::new(SimPin::new()),
        Rc::new(SimScheduler::new()),
        config,
    );
    assert!(matches!(result, Err(DialPadError::Config(ConfigError::NoSamples))));
}

#[test]
fn custom_ranges() {
    let _ = pretty_env_logger::try_init();
    let sched = SimScheduler::new();
    let line = SimLine::new(sched.clone());
    let ranges = RangeTable::new(vec![
        dialpad_gpio::keypad::KeyRange::new(Key::KeyR, 0, 100),
        dialpad_gpio::keypad::KeyRange::new(Key::None, 200, 1023),
    ]).unwrap();
    let pad = DialPad::with_ranges(
        PadLine { adc: Box::new(line.adc()), irq: Box::new(line.irq()) },
        Box::new(SimPin::new()),
        Rc::new(sched.clone()),
        DialPadConfig::default(),
        ranges,
    ).unwrap();

    line.press(50);
    sched.advance(ms(100));
    assert_eq!(pad.current_key(), Key::KeyR);

    line.set_level(900);
    sched.advance(ms(300));
    assert_eq!(pad.current_key(), Key::None);
    assert_eq!(pad.state(), PadState::Idle);
}
