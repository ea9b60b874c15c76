// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! TRIAC gate firing in the one-shot alarm interrupt.

use crate::{
    channel::{Gate, IsrState},
    controller::Controller,
    hal::{AlarmEvent, AlarmId, AlarmKind, Alarms, GateOutputs, TriacHal},
    mutex::IrqCtx,
    timer::RelTimestamp,
};
use log::warn;

/// Cancel all outstanding alarms and switch the gate off.
///
/// Cancelling is idempotent. This is safe to call in any state.
pub(crate) fn disarm<H: Alarms + GateOutputs>(hal: &H, gate: &Gate, isr: &mut IsrState) {
    if let Some(id) = isr.alarm_activate.take() {
        hal.cancel_alarm(id);
    }
    if let Some(id) = isr.alarm_deactivate.take() {
        hal.cancel_alarm(id);
    }
    hal.put_masked(gate.mask, gate.inactive_level());
}

fn activate<H: TriacHal>(hal: &H, pin: u8, gate: &Gate, isr: &mut IsrState, id: AlarmId) {
    if isr.alarm_activate != Some(id) {
        // Cancelled after it already fired.
        return;
    }
    isr.alarm_activate = None;
    assert!(
        isr.alarm_deactivate.is_none(),
        "Ch {pin}: gate activation while deactivation pending"
    );

    hal.put_masked(gate.mask, gate.active_level());

    let at = hal.now() + RelTimestamp::from_micros(isr.active.on_time);
    let event = AlarmEvent {
        pin,
        kind: AlarmKind::Deactivate,
    };
    isr.alarm_deactivate = hal.schedule_alarm(at, event);
    if isr.alarm_deactivate.is_none() {
        hal.put_masked(gate.mask, gate.inactive_level());
        warn!("Ch {pin}: No alarm available for gate deactivation");
    }
}

fn deactivate<H: TriacHal>(hal: &H, gate: &Gate, isr: &mut IsrState, id: AlarmId) {
    if isr.alarm_deactivate != Some(id) {
        return;
    }
    isr.alarm_deactivate = None;
    hal.put_masked(gate.mask, gate.inactive_level());
}

impl<const PINS: usize> Controller<PINS> {
    /// One-shot alarm `id` fired with its payload `event`.
    pub fn irq_handler_alarm<H: TriacHal>(
        &self,
        c: &IrqCtx<'_>,
        hal: &H,
        id: AlarmId,
        event: AlarmEvent,
    ) {
        let Some(ch) = self.channel(event.pin) else {
            return;
        };

        c.with_cs(|cs| {
            let Some(setup) = ch.setup.get(cs) else {
                return;
            };

            let mut isr = ch.isr.get(cs);
            match event.kind {
                AlarmKind::Activate => activate(hal, event.pin, &setup.gate, &mut isr, id),
                AlarmKind::Deactivate => deactivate(hal, &setup.gate, &mut isr, id),
            }
            ch.isr.set(cs, isr);
        });
    }
}


// vim: ts=4 sw=4 expandtab
