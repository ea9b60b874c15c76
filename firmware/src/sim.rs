// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated hardware for the unit tests.

use crate::{
    analog::PowerAnalyzer,
    controller::Controller,
    hal::{
        AlarmEvent, AlarmId, AlarmKind, Alarms, CaptureDma, Clock, DmaChannel, GateOutputs,
        PinMask, RoundRobinAdc, SampleTimer, SenseInputs,
    },
    mutex::irq_entry,
    timer::Timestamp,
};
use std::cell::{Cell, RefCell};

const ADC_PINS: core::ops::RangeInclusive<u8> = 26..=29;

pub struct SimHal {
    now: Cell<u64>,

    outputs: Cell<PinMask>,
    gates: Cell<PinMask>,
    sense: Cell<PinMask>,
    edge_irqs: Cell<PinMask>,

    alarms: RefCell<Vec<(Timestamp, AlarmEvent, AlarmId)>>,
    alarm_slots: Cell<usize>,
    next_alarm: Cell<i32>,
    scheduled: Cell<[usize; 2]>,
    cancelled: Cell<usize>,

    timer_available: Cell<bool>,
    sample_rate: Cell<Option<u32>>,
    adc_available: Cell<bool>,
    adc_inputs: Cell<Option<[u8; 2]>>,
    /// Number of remaining polls that report the ADC ready.
    adc_ready: Cell<usize>,
    adc_polls: Cell<usize>,
    conversions: Cell<usize>,
    dma_available: Cell<bool>,
    dma_claimed: Cell<Option<DmaChannel>>,
    dma_dst: Cell<*mut u16>,
    dma_len: Cell<usize>,
    dma_busy: Cell<bool>,
}

impl SimHal {
    pub fn new() -> Self {
        Self {
            now: Cell::new(1_000_000),
            outputs: Cell::new(0),
            gates: Cell::new(0),
            sense: Cell::new(0),
            edge_irqs: Cell::new(0),
            alarms: RefCell::new(Vec::new()),
            alarm_slots: Cell::new(16),
            next_alarm: Cell::new(1),
            scheduled: Cell::new([0; 2]),
            cancelled: Cell::new(0),
            timer_available: Cell::new(true),
            sample_rate: Cell::new(None),
            adc_available: Cell::new(true),
            adc_inputs: Cell::new(None),
            adc_ready: Cell::new(usize::MAX),
            adc_polls: Cell::new(0),
            conversions: Cell::new(0),
            dma_available: Cell::new(true),
            dma_claimed: Cell::new(None),
            dma_dst: Cell::new(core::ptr::null_mut()),
            dma_len: Cell::new(0),
            dma_busy: Cell::new(false),
        }
    }

    pub fn advance(&self, us: u32) {
        self.now.set(self.now.get() + us as u64);
    }

    fn kind_index(kind: AlarmKind) -> usize {
        match kind {
            AlarmKind::Activate => 0,
            AlarmKind::Deactivate => 1,
        }
    }

    // Phase control.

    pub fn gate(&self, pin: u8) -> bool {
        self.gates.get() & (1 << pin) != 0
    }

    pub fn gates(&self) -> PinMask {
        self.gates.get()
    }

    pub fn is_output(&self, pin: u8) -> bool {
        self.outputs.get() & (1 << pin) != 0
    }

    pub fn edge_irqs(&self) -> PinMask {
        self.edge_irqs.get()
    }

    pub fn set_alarm_slots(&self, slots: usize) {
        self.alarm_slots.set(slots);
    }

    /// Outstanding alarms, earliest first.
    pub fn pending_alarm_ids(&self) -> Vec<(Timestamp, AlarmEvent, AlarmId)> {
        let mut alarms = self.alarms.borrow().clone();
        alarms.sort_by_key(|&(at, _, AlarmId(id))| (at, id));
        alarms
    }

    pub fn pending_alarms(&self) -> Vec<(Timestamp, AlarmEvent)> {
        self.pending_alarm_ids()
            .into_iter()
            .map(|(at, event, _)| (at, event))
            .collect()
    }

    /// Number of successfully scheduled alarms of `kind`.
    pub fn scheduled(&self, kind: AlarmKind) -> usize {
        self.scheduled.get()[Self::kind_index(kind)]
    }

    /// Number of cancelled outstanding alarms.
    pub fn cancelled(&self) -> usize {
        self.cancelled.get()
    }

    /// Remove an alarm from the hardware without running its handler.
    pub fn take_alarm(&self, id: AlarmId) {
        self.alarms.borrow_mut().retain(|&(_, _, i)| i != id);
    }

    pub fn edge<const PINS: usize>(&self, ctl: &Controller<PINS>, pin: u8) {
        // SAFETY: Emulated GPIO interrupt.
        unsafe { irq_entry(|c| ctl.irq_handler_edge(c, self, pin)) };
    }

    /// Run the alarm handler, no matter whether the alarm is outstanding.
    pub fn fire<const PINS: usize>(&self, ctl: &Controller<PINS>, id: AlarmId, event: AlarmEvent) {
        // SAFETY: Emulated alarm interrupt.
        unsafe { irq_entry(|c| ctl.irq_handler_alarm(c, self, id, event)) };
    }

    /// Advance the clock to `until` and fire all alarms that are due on the way.
    pub fn run_alarms_until<const PINS: usize>(&self, ctl: &Controller<PINS>, until: Timestamp) {
        loop {
            let due = self
                .pending_alarm_ids()
                .into_iter()
                .find(|&(at, _, _)| at <= until);
            let Some((at, event, id)) = due else {
                break;
            };
            self.take_alarm(id);
            self.now.set(self.now.get().max(at.as_micros()));
            self.fire(ctl, id, event);
        }
        self.now.set(self.now.get().max(until.as_micros()));
    }

    // Power analyzer.

    pub fn set_timer_available(&self, available: bool) {
        self.timer_available.set(available);
    }

    pub fn set_dma_available(&self, available: bool) {
        self.dma_available.set(available);
    }

    pub fn set_adc_ready(&self, ready: bool) {
        self.adc_ready.set(if ready { usize::MAX } else { 0 });
    }

    /// The ADC reports ready for the next `polls` polls only.
    pub fn set_adc_ready_polls(&self, polls: usize) {
        self.adc_ready.set(polls);
    }

    pub fn set_adc_available(&self, available: bool) {
        self.adc_available.set(available);
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate.get()
    }

    pub fn adc_inputs(&self) -> Option<[u8; 2]> {
        self.adc_inputs.get()
    }

    pub fn adc_polls(&self) -> usize {
        self.adc_polls.get()
    }

    pub fn conversions(&self) -> usize {
        self.conversions.get()
    }

    pub fn dma_claimed(&self) -> bool {
        self.dma_claimed.get().is_some()
    }

    pub fn dma_busy_now(&self) -> bool {
        self.dma_busy.get()
    }

    pub fn dma_len(&self) -> usize {
        self.dma_len.get()
    }

    pub fn sample_tick<const BUF: usize, const HIST: usize>(&self, an: &PowerAnalyzer<BUF, HIST>) {
        // SAFETY: Emulated timer interrupt.
        unsafe { irq_entry(|c| an.irq_handler_sample_tick(c, self)) };
    }

    /// Raise the DMA completion interrupt without finishing the transfer.
    pub fn dma_complete_irq<const BUF: usize, const HIST: usize>(
        &self,
        an: &PowerAnalyzer<BUF, HIST>,
    ) {
        // SAFETY: Emulated DMA interrupt.
        unsafe { irq_entry(|c| an.irq_handler_dma_complete(c, self)) };
    }

    /// Finish the running transfer with `samples` and raise the completion interrupt.
    pub fn complete_dma<const BUF: usize, const HIST: usize>(
        &self,
        an: &PowerAnalyzer<BUF, HIST>,
        samples: &[u16],
    ) {
        assert!(self.dma_busy.get());
        assert_eq!(samples.len(), self.dma_len.get());
        // SAFETY: The analyzer handed this memory to the running transfer.
        unsafe {
            core::ptr::copy_nonoverlapping(samples.as_ptr(), self.dma_dst.get(), samples.len());
        }
        self.dma_busy.set(false);
        self.dma_complete_irq(an);
    }
}

impl Clock for SimHal {
    fn now(&self) -> Timestamp {
        Timestamp(self.now.get())
    }
}

impl GateOutputs for SimHal {
    fn init_outputs(&self, mask: PinMask, level: bool) {
        self.outputs.set(self.outputs.get() | mask);
        self.put_masked(mask, level);
    }

    fn put_masked(&self, mask: PinMask, level: bool) {
        assert_eq!(self.outputs.get() & mask, mask, "not an output");
        if level {
            self.gates.set(self.gates.get() | mask);
        } else {
            self.gates.set(self.gates.get() & !mask);
        }
    }
}

impl SenseInputs for SimHal {
    fn init_sense(&self, pin: u8) {
        self.sense.set(self.sense.get() | (1 << pin));
    }

    fn set_edge_irq(&self, pin: u8, enabled: bool) {
        if enabled {
            assert!(self.sense.get() & (1 << pin) != 0, "not a sense input");
            self.edge_irqs.set(self.edge_irqs.get() | (1 << pin));
        } else {
            self.edge_irqs.set(self.edge_irqs.get() & !(1 << pin));
        }
    }
}

impl Alarms for SimHal {
    fn schedule_alarm(&self, at: Timestamp, event: AlarmEvent) -> Option<AlarmId> {
        let mut alarms = self.alarms.borrow_mut();
        if alarms.len() >= self.alarm_slots.get() {
            return None;
        }
        let id = AlarmId(self.next_alarm.get());
        self.next_alarm.set(id.0 + 1);
        alarms.push((at, event, id));

        let mut scheduled = self.scheduled.get();
        scheduled[Self::kind_index(event.kind)] += 1;
        self.scheduled.set(scheduled);
        Some(id)
    }

    fn cancel_alarm(&self, id: AlarmId) {
        let mut alarms = self.alarms.borrow_mut();
        let before = alarms.len();
        alarms.retain(|&(_, _, i)| i != id);
        if alarms.len() != before {
            self.cancelled.set(self.cancelled.get() + 1);
        }
    }
}

impl SampleTimer for SimHal {
    fn start_sample_timer(&self, hz: u32) -> bool {
        if self.timer_available.get() {
            self.sample_rate.set(Some(hz));
        }
        self.timer_available.get()
    }

    fn stop_sample_timer(&self) {
        self.sample_rate.set(None);
    }
}

impl RoundRobinAdc for SimHal {
    fn adc_input(&self, pin: u8) -> Option<u8> {
        ADC_PINS.contains(&pin).then(|| pin - ADC_PINS.start())
    }

    fn adc_configure(&self, inputs: [u8; 2]) -> bool {
        assert!(inputs[0] < inputs[1]);
        if !self.adc_available.get() {
            return false;
        }
        self.adc_inputs.set(Some(inputs));
        true
    }

    fn adc_start_once(&self) {
        assert!(self.adc_inputs.get().is_some(), "ADC not configured");
        self.conversions.set(self.conversions.get() + 1);
    }

    fn adc_ready(&self) -> bool {
        self.adc_polls.set(self.adc_polls.get() + 1);
        match self.adc_ready.get() {
            0 => false,
            usize::MAX => true,
            n => {
                self.adc_ready.set(n - 1);
                true
            }
        }
    }

    fn adc_stop(&self) {
        self.adc_inputs.set(None);
    }
}

impl CaptureDma for SimHal {
    fn dma_claim(&self) -> Option<DmaChannel> {
        if !self.dma_available.get() || self.dma_claimed.get().is_some() {
            return None;
        }
        self.dma_claimed.set(Some(DmaChannel(3)));
        self.dma_claimed.get()
    }

    fn dma_unclaim(&self, ch: DmaChannel) {
        assert_eq!(self.dma_claimed.get(), Some(ch));
        self.dma_claimed.set(None);
    }

    unsafe fn dma_start(&self, ch: DmaChannel, dst: *mut u16, len: usize) {
        assert_eq!(self.dma_claimed.get(), Some(ch));
        assert!(!self.dma_busy.get());
        self.dma_dst.set(dst);
        self.dma_len.set(len);
        self.dma_busy.set(true);
    }

    fn dma_busy(&self, ch: DmaChannel) -> bool {
        assert_eq!(self.dma_claimed.get(), Some(ch));
        self.dma_busy.get()
    }

    fn dma_abort(&self, _ch: DmaChannel) {
        self.dma_busy.set(false);
    }
}

mod test {
    use super::*;
    use crate::timer::RelTimestamp;

    #[test]
    fn test_sim_alarm_order() {
        let hal = SimHal::new();
        let event = AlarmEvent {
            pin: 0,
            kind: AlarmKind::Activate,
        };
        let t = hal.now();
        let late = hal.schedule_alarm(t + RelTimestamp::from_micros(20), event);
        let early = hal.schedule_alarm(t + RelTimestamp::from_micros(10), event);
        assert_eq!(hal.pending_alarm_ids()[0].2, early.unwrap());
        hal.cancel_alarm(early.unwrap());
        hal.cancel_alarm(early.unwrap());
        assert_eq!(hal.cancelled(), 1);
        assert_eq!(hal.pending_alarm_ids()[0].2, late.unwrap());
    }
}

// vim: ts=4 sw=4 expandtab
