use serde_json::json;
use tracing::{info, warn};

use super::{wp_method, BaseState, GetNextStateCaseReply, HandlerContext, StateHandler};
use crate::error::RmadErrorCode;
use crate::logs;
use crate::metrics::{keys as metrics_keys, utils as metrics_utils, AdditionalActivity};
use crate::state::{RmadState, StateCase, WpDisableRsuState};
use crate::store::keys;

const RSU_URL: &str = "https://chromeos.google.com/partner/console/cr50reset";

/// Disables write protect with a server-signed unlock code
///
/// The unlock only takes effect after a reboot, so a successful code keeps
/// the workflow here until the switch reads as disabled.
#[derive(Debug)]
pub struct WpDisableRsuStateHandler {
    base: BaseState,
}

impl WpDisableRsuStateHandler {
    pub fn new(ctx: HandlerContext) -> Self {
        Self {
            base: BaseState::new(ctx, StateCase::WpDisableRsu),
        }
    }

    fn reply(error: RmadErrorCode) -> GetNextStateCaseReply {
        GetNextStateCaseReply::stay(error, StateCase::WpDisableRsu)
    }
}

impl StateHandler for WpDisableRsuStateHandler {
    fn base(&self) -> &BaseState {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseState {
        &mut self.base
    }

    fn is_abortable(&self) -> bool {
        true
    }

    fn initialize_state(&mut self) -> RmadErrorCode {
        if self.retrieve_state() {
            if let RmadState::WpDisableRsu(state) = &self.base.state {
                if !state.challenge_code.is_empty() {
                    return RmadErrorCode::Ok;
                }
            }
        }

        let ctx = self.base.ctx.clone();
        let Some(challenge_code) = ctx.hardware.gsc.rsu_challenge_code() else {
            warn!("GSC returned no RSU challenge code");
            return RmadErrorCode::WriteProtectDisableRsuNoChallenge;
        };
        let hwid = ctx.hardware.gsc.hwid().unwrap_or_default();
        let challenge_url = format!(
            "{}?challenge={}&hwid={}",
            RSU_URL,
            challenge_code,
            hwid.replace(' ', "_")
        );

        self.base.state = RmadState::WpDisableRsu(WpDisableRsuState {
            challenge_code: challenge_code.clone(),
            hwid: hwid.clone(),
            challenge_url,
            unlock_code: String::new(),
        });
        if !self.store_state() {
            return RmadErrorCode::CannotWrite;
        }
        if !logs::record_rsu_challenge_code(&ctx.store, ctx.now(), &challenge_code, &hwid) {
            warn!("Failed to record RSU challenge code event");
        }
        RmadErrorCode::Ok
    }

    fn get_next_state_case(&mut self, state: &RmadState) -> GetNextStateCaseReply {
        let RmadState::WpDisableRsu(payload) = state else {
            return Self::reply(RmadErrorCode::RequestInvalid);
        };
        let ctx = self.base.ctx.clone();
        let store = &ctx.store;

        // Back from the reboot with the switch already released.
        if !ctx.hwwp_enabled() {
            let updates = vec![
                (keys::RSU_REBOOT_PENDING.to_string(), json!(false)),
                (keys::WP_DISABLE_METHOD.to_string(), json!(wp_method::RSU)),
            ];
            if !store.set_values(updates) {
                return Self::reply(RmadErrorCode::CannotWrite);
            }
            return GetNextStateCaseReply::next(StateCase::WpDisableComplete);
        }

        if payload.unlock_code.is_empty() {
            return Self::reply(RmadErrorCode::RequestArgsMissing);
        }
        if !ctx.hardware.gsc.perform_rsu(&payload.unlock_code) {
            warn!("RSU unlock code rejected");
            return Self::reply(RmadErrorCode::WriteProtectDisableRsuCodeInvalid);
        }

        let updates = vec![
            (keys::WP_DISABLE_METHOD.to_string(), json!(wp_method::RSU)),
            (keys::RSU_REBOOT_PENDING.to_string(), json!(true)),
        ];
        if !store.set_values(updates)
            || !metrics_utils::set_metrics_value(store, metrics_keys::WP_DISABLE_METHOD, &wp_method::RSU)
        {
            return Self::reply(RmadErrorCode::CannotWrite);
        }
        if !logs::record_wp_disable_method(store, ctx.now(), StateCase::WpDisableRsu, wp_method::RSU) {
            warn!("Failed to record write protect disable method event");
        }
        info!("RSU accepted, rebooting to release write protect");

        Self::reply(RmadErrorCode::ExpectReboot).with_activity(AdditionalActivity::Reboot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_utils::TestContext;

    fn unlock(code: &str) -> RmadState {
        RmadState::WpDisableRsu(WpDisableRsuState {
            unlock_code: code.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_init_fetches_challenge() {
        let t = TestContext::new();
        let mut handler = WpDisableRsuStateHandler::new(t.ctx.clone());
        assert_eq!(handler.initialize_state(), RmadErrorCode::Ok);

        let RmadState::WpDisableRsu(state) = handler.state() else {
            panic!("wrong state");
        };
        assert_eq!(state.challenge_code, "AAAABBBBCCCCDDDD");
        assert!(state.challenge_url.contains("challenge=AAAABBBBCCCCDDDD"));
        assert!(state.challenge_url.contains("hwid=FAKE-HWID_A1B-C2D"));
    }

    #[test]
    fn test_init_without_challenge() {
        let t = TestContext::new();
        t.device.update(|d| d.challenge_code = None);
        let mut handler = WpDisableRsuStateHandler::new(t.ctx.clone());
        assert_eq!(
            handler.initialize_state(),
            RmadErrorCode::WriteProtectDisableRsuNoChallenge
        );
    }

    #[test]
    fn test_unlock_then_reboot() {
        let t = TestContext::new();
        let mut handler = WpDisableRsuStateHandler::new(t.ctx.clone());
        handler.initialize_state();

        assert_eq!(
            handler.get_next_state_case(&unlock("")).error,
            RmadErrorCode::RequestArgsMissing
        );
        assert_eq!(
            handler.get_next_state_case(&unlock("BAD")).error,
            RmadErrorCode::WriteProtectDisableRsuCodeInvalid
        );

        let reply = handler.get_next_state_case(&unlock("UNLOCK01"));
        assert_eq!(reply.error, RmadErrorCode::ExpectReboot);
        assert_eq!(reply.state_case, StateCase::WpDisableRsu);
        assert_eq!(reply.additional_activity, AdditionalActivity::Reboot);
        assert_eq!(t.store().get::<bool>(keys::RSU_REBOOT_PENDING), Some(true));

        t.device.reboot();
        let reply = handler.get_next_state_case(&unlock(""));
        assert_eq!(reply, GetNextStateCaseReply::next(StateCase::WpDisableComplete));
        assert_eq!(t.store().get::<bool>(keys::RSU_REBOOT_PENDING), Some(false));
        assert_eq!(
            t.store().get::<String>(keys::WP_DISABLE_METHOD),
            Some(wp_method::RSU.to_string())
        );
    }
}
