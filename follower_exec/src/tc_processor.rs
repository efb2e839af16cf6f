//! # Telecommand processor
//!
//! Executes telecommands against the state shared with the executive's tasks.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::power::BatteryTm,
    tc::{BatteryReset, Tc, TcResponse},
};
use log::{info, warn};
use std::sync::mpsc::Sender;

use crate::shared::{SnapshotCell, TargetColourCell};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The state a telecommand can act on.
pub struct TcContext<'a> {
    pub target_colour: &'a TargetColourCell,

    pub battery: &'a SnapshotCell<BatteryTm>,

    /// Queue of resets for the power task
    pub resets: &'a Sender<BatteryReset>,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Execute a telecommand, returning the response to send back.
pub fn exec(ctx: &TcContext, tc: &Tc) -> TcResponse {
    match tc {
        Tc::Heartbeat => TcResponse::Ok,
        Tc::SetTargetColour(args) => {
            info!("Target colour set to {:?}", args.colour);
            ctx.target_colour.set(args.colour);
            TcResponse::Ok
        }
        Tc::ClearTargetColour => {
            info!("Target colour cleared");
            ctx.target_colour.clear();
            TcResponse::Ok
        }
        Tc::QueryBattery => match ctx.battery.latest() {
            Some(tm) => TcResponse::Battery((*tm).clone()),
            None => TcResponse::Unavailable,
        },
        Tc::ResetBattery(args) => match ctx.resets.send(args.reset) {
            Ok(()) => {
                info!("Battery reset ({:?}) queued", args.reset);
                TcResponse::Ok
            }
            Err(_) => {
                warn!("Battery reset rejected, the power task is not running");
                TcResponse::CannotExecute
            }
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Utc;
    use comms_if::tc::{BatteryResetArgs, Colour, ColourArgs};
    use std::sync::mpsc;

    #[test]
    fn test_exec() {
        let target_colour = TargetColourCell::new();
        let battery = SnapshotCell::new();
        let (tx, rx) = mpsc::channel();

        let ctx = TcContext {
            target_colour: &target_colour,
            battery: &battery,
            resets: &tx,
        };

        assert_eq!(exec(&ctx, &Tc::Heartbeat), TcResponse::Ok);

        exec(
            &ctx,
            &Tc::SetTargetColour(ColourArgs {
                colour: Colour::Yellow,
            }),
        );
        assert_eq!(target_colour.get(), Some(Colour::Yellow));
        exec(&ctx, &Tc::ClearTargetColour);
        assert_eq!(target_colour.get(), None);

        assert_eq!(exec(&ctx, &Tc::QueryBattery), TcResponse::Unavailable);

        let tm = BatteryTm {
            charge_soc_percent: 80.0,
            voltage_soc_percent: 78.0,
            motor_power_w: 5.0,
            logic_power_w: 2.5,
            battery_voltage_v: 15.5,
            timestamp: Utc::now(),
        };
        battery.publish(tm.clone());
        assert_eq!(exec(&ctx, &Tc::QueryBattery), TcResponse::Battery(tm));

        let reset = Tc::ResetBattery(BatteryResetArgs {
            reset: BatteryReset::ToFull,
        });
        assert_eq!(exec(&ctx, &reset), TcResponse::Ok);
        assert_eq!(rx.try_recv().unwrap(), BatteryReset::ToFull);

        drop(rx);
        assert_eq!(exec(&ctx, &reset), TcResponse::CannotExecute);
    }
}
