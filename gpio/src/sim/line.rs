use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;
use log::trace;
use crate::adc::{AdcConfig, AdcDriver};
use crate::sched::Scheduler;
use crate::sim::{PinMode, SimScheduler};
use crate::{GpioError, GpioInterrupt, GpioPin, GpioResult, IrqHandler};

/// Reading of a ladder line nobody touches: the converter's largest result.
pub const REST_LEVEL: u16 = AdcConfig::DIAL_PAD.resolution.max_value();

#[derive(Default)]
struct LineState {
    level: u16,
    queued: VecDeque<u16>,

    adc_config: Option<AdcConfig>,
    adc_enabled: bool,
    converting: bool,
    result: u16,
    conversions: usize,
    conversion_handler: Option<IrqHandler>,

    mode: Option<PinMode>,
    interrupt_enabled: bool,
    edge_handler: Option<IrqHandler>,
    edges: usize,
}

/// A simulated pad line: an analog input and an edge interrupt sharing one pin.
///
/// Use [SimLine::adc] and [SimLine::irq] to get the two peripherals for a
/// [PadLine](crate::keypad::PadLine), and keep the [SimLine] around to drive the level.
/// Conversions complete through a task posted to the scheduler.
#[derive(Clone)]
pub struct SimLine {
    state: Rc<RefCell<LineState>>,
    scheduler: SimScheduler,
}

impl Debug for SimLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimLine({})", self.state.borrow().level)
    }
}

impl SimLine {
    pub fn new(scheduler: SimScheduler) -> Self {
        let state = LineState {
            level: REST_LEVEL,
            ..Default::default()
        };
        SimLine {
            state: Rc::new(RefCell::new(state)),
            scheduler,
        }
    }

    pub fn adc(&self) -> SimAdc {
        SimAdc { line: self.clone() }
    }

    pub fn irq(&self) -> SimIrq {
        SimIrq { line: self.clone() }
    }

    /// Touches a key: sets the line to `level` and delivers a falling edge if the interrupt is enabled.
    pub fn press(&self, level: u16) {
        self.set_level(level);
        if self.state.borrow().interrupt_enabled {
            trace!("Falling edge on {:?}", self);
            self.state.borrow_mut().edges += 1;
            self.call(|state| &mut state.edge_handler);
        }
    }

    /// Delivers a falling edge whether or not the interrupt is enabled, like a latched
    /// interrupt arriving late.
    pub fn raise_edge(&self) {
        trace!("Raising edge on {:?}", self);
        self.state.borrow_mut().edges += 1;
        self.call(|state| &mut state.edge_handler);
    }

    /// Signals a completed conversion with none in flight. The last result stays readable.
    pub fn raise_conversion_complete(&self) {
        trace!("Raising conversion complete on {:?}", self);
        self.call(|state| &mut state.conversion_handler);
    }

    /// Lets go of the pad, returning the line to [REST_LEVEL].
    pub fn release(&self) {
        self.set_level(REST_LEVEL);
    }

    /// Sets the line level without delivering an edge.
    pub fn set_level(&self, level: u16) {
        self.state.borrow_mut().level = level;
    }

    pub fn level(&self) -> u16 {
        self.state.borrow().level
    }

    /// Queues exact results for the next conversions, ahead of the line level.
    pub fn queue_samples(&self, samples: impl IntoIterator<Item = u16>) {
        self.state.borrow_mut().queued.extend(samples);
    }

    pub fn adc_config(&self) -> Option<AdcConfig> {
        self.state.borrow().adc_config
    }

    pub fn adc_enabled(&self) -> bool {
        self.state.borrow().adc_enabled
    }

    pub fn interrupt_enabled(&self) -> bool {
        self.state.borrow().interrupt_enabled
    }

    pub fn mode(&self) -> Option<PinMode> {
        self.state.borrow().mode
    }

    /// Gets the number of completed conversions.
    pub fn conversions(&self) -> usize {
        self.state.borrow().conversions
    }

    /// Gets the number of falling edges delivered.
    pub fn edges(&self) -> usize {
        self.state.borrow().edges
    }

    /// Calls a handler with the state released, so it may call back into the line.
    fn call(&self, select: fn(&mut LineState) -> &mut Option<IrqHandler>) {
        let handler = select(&mut *self.state.borrow_mut()).take();
        if let Some(mut handler) = handler {
            handler();
            let mut state = self.state.borrow_mut();
            let slot = select(&mut *state);
            if slot.is_none() {
                *slot = Some(handler);
            }
        }
    }

    fn complete_conversion(&self) {
        {
            let mut state = self.state.borrow_mut();
            if !state.converting {
                return;
            }
            state.converting = false;
            state.result = state.queued.pop_front().unwrap_or(state.level);
            state.conversions += 1;
            trace!("Conversion {} done: {}", state.conversions, state.result);
        }
        self.call(|state| &mut state.conversion_handler);
    }
}

/// The analog side of a [SimLine].
#[derive(Debug)]
pub struct SimAdc {
    line: SimLine,
}

impl AdcDriver for SimAdc {
    fn configure(&mut self, config: AdcConfig) -> GpioResult<()> {
        self.line.state.borrow_mut().adc_config = Some(config);
        Ok(())
    }

    fn enable(&mut self) -> GpioResult<()> {
        self.line.state.borrow_mut().adc_enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> GpioResult<()> {
        let mut state = self.line.state.borrow_mut();
        state.adc_enabled = false;
        state.converting = false;
        Ok(())
    }

    fn start_conversion(&mut self) -> GpioResult<()> {
        {
            let mut state = self.line.state.borrow_mut();
            if !state.adc_enabled {
                return Err(GpioError::Disabled);
            }
            if state.converting {
                return Err(GpioError::Busy);
            }
            state.converting = true;
        }

        let line = self.line.clone();
        self.line.scheduler.post(Box::new(move || line.complete_conversion()));
        Ok(())
    }

    fn read_result(&self) -> GpioResult<u16> {
        Ok(self.line.state.borrow().result)
    }

    fn on_conversion_complete(&mut self, handler: IrqHandler) -> GpioResult<()> {
        self.line.state.borrow_mut().conversion_handler = Some(handler);
        Ok(())
    }
}

/// The digital side of a [SimLine].
#[derive(Debug)]
pub struct SimIrq {
    line: SimLine,
}

impl GpioPin for SimIrq {
    fn set_input_mode(&mut self) -> GpioResult<()> {
        self.line.state.borrow_mut().mode = Some(PinMode::Input);
        Ok(())
    }

    fn set_output_mode(&mut self) -> GpioResult<()> {
        self.line.state.borrow_mut().mode = Some(PinMode::Output);
        Ok(())
    }

    fn write(&mut self, _value: bool) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }
}

impl GpioInterrupt for SimIrq {
    fn enable_interrupt(&mut self) -> GpioResult<()> {
        self.line.state.borrow_mut().interrupt_enabled = true;
        Ok(())
    }

    fn disable_interrupt(&mut self) -> GpioResult<()> {
        self.line.state.borrow_mut().interrupt_enabled = false;
        Ok(())
    }

    fn on_falling_edge(&mut self, handler: IrqHandler) -> GpioResult<()> {
        self.line.state.borrow_mut().edge_handler = Some(handler);
        Ok(())
    }
}
