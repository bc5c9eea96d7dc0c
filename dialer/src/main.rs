mod app;
mod config;
mod script;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::env::var;
use std::rc::Rc;
use std::time::Duration;
use dotenv::dotenv;
use log::{debug, info};
use sysinfo::System;
use dialpad_gpio::keypad::{DialPad, KeyEvent, PadLine, RangeTable};
use dialpad_gpio::sim::{SimLine, SimPin, SimScheduler};
use crate::app::Dialer;
use crate::config::Config;
use crate::script::{parse_script, settle_time};

const DEFAULT_SCRIPT: &str = "0,7,6,1,2,3,4,S,5,R:800,R";

type EventQueue = Rc<RefCell<VecDeque<KeyEvent>>>;

/// Lets simulated time pass, then hands the events the pad reported to the dialer.
fn run_for(sched: &SimScheduler, duration: Duration, events: &EventQueue, dialer: &mut Dialer) {
    sched.advance(duration);
    while let Some(event) = events.borrow_mut().pop_front() {
        dialer.update(event);
    }
}

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    const UNKNOWN_STR: &str = "???";

    info!("Dialer starting...");
    info!(
        "Host {} running {}, architecture {}",
        System::host_name().as_deref().unwrap_or(UNKNOWN_STR),
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::cpu_arch(),
    );

    debug!("Trying to load config...");
    let config = if let Some(config) = Config::try_load() {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save()?;
        info!("Default config saved.");
        config
    };
    debug!("{:?}", config);

    let script = parse_script(&var("DIALER_SCRIPT").unwrap_or_else(|_| DEFAULT_SCRIPT.to_string()))?;
    info!("Replaying {} key presses.", script.len());

    debug!("Initializing simulated dial pad...");
    let sched = SimScheduler::new();
    let line = SimLine::new(sched.clone());
    let pad = DialPad::new(
        PadLine {
            adc: Box::new(line.adc()),
            irq: Box::new(line.irq()),
        },
        Box::new(SimPin::new()),
        Rc::new(sched.clone()),
        config.pad.clone(),
    )?;

    let events = EventQueue::default();
    let queue = events.clone();
    pad.on_pressed(move |key| queue.borrow_mut().push_back(KeyEvent::Pressed(key)));
    let queue = events.clone();
    pad.on_released(move |key| queue.borrow_mut().push_back(KeyEvent::Released(key)));
    let queue = events.clone();
    pad.on_hold(move |key| queue.borrow_mut().push_back(KeyEvent::Hold(key)));

    info!("{:?} initialized.", pad);

    let ranges = RangeTable::default();
    let settle = settle_time(&config.pad);
    let mut dialer = Dialer::new(config.max_digits);

    for step in &script {
        let level = ranges
            .nominal(step.key)
            .ok_or_else(|| eyre::eyre!("No ladder level for key {}", step.key))?;

        debug!("Touching {} for {:?}.", step.key, step.press);
        line.press(level);
        run_for(&sched, step.press, &events, &mut dialer);

        line.release();
        run_for(&sched, settle, &events, &mut dialer);
    }

    info!("Done after {:?} of simulated time.", sched.now());
    info!("{} call(s) placed:", dialer.calls().len());
    for (i, number) in dialer.calls().iter().enumerate() {
        info!("  {}. {}", i + 1, number);
    }
    if !dialer.entry().is_empty() {
        info!("Left in entry: {}", dialer.entry());
    }

    Ok(())
}
