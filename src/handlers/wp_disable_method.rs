use super::{BaseState, GetNextStateCaseReply, HandlerContext, StateHandler};
use crate::error::RmadErrorCode;
use crate::state::{RmadState, StateCase, WpDisableMethodChoice};
use crate::store::keys;

#[derive(Debug)]
pub struct WpDisableMethodStateHandler {
    base: BaseState,
}

impl WpDisableMethodStateHandler {
    pub fn new(ctx: HandlerContext) -> Self {
        Self {
            base: BaseState::new(ctx, StateCase::WpDisableMethod),
        }
    }
}

impl StateHandler for WpDisableMethodStateHandler {
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
        let store = &self.base.ctx.store;
        // The choice only exists when CCD leaves RSU optional.
        if store.get::<bool>(keys::WP_DISABLE_REQUIRED) != Some(true)
            || store.get::<bool>(keys::CCD_BLOCKED) != Some(false)
        {
            return RmadErrorCode::StateHandlerInitializationFailed;
        }
        self.retrieve_state();
        RmadErrorCode::Ok
    }

    fn get_next_state_case(&mut self, state: &RmadState) -> GetNextStateCaseReply {
        let RmadState::WpDisableMethod(payload) = state else {
            return GetNextStateCaseReply::stay(
                RmadErrorCode::RequestInvalid,
                StateCase::WpDisableMethod,
            );
        };
        let next = match payload.choice {
            WpDisableMethodChoice::Unknown => {
                return GetNextStateCaseReply::stay(
                    RmadErrorCode::RequestArgsMissing,
                    StateCase::WpDisableMethod,
                )
            }
            WpDisableMethodChoice::Rsu => StateCase::WpDisableRsu,
            WpDisableMethodChoice::Physical => StateCase::WpDisablePhysical,
        };

        self.base.state = state.clone();
        if !self.store_state() {
            return GetNextStateCaseReply::stay(RmadErrorCode::CannotWrite, StateCase::WpDisableMethod);
        }
        GetNextStateCaseReply::next(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_utils::TestContext;
    use crate::state::WpDisableMethodState;

    #[test]
    fn test_init_requires_unblocked_ccd() {
        let t = TestContext::new();
        assert!(t.store().set(keys::WP_DISABLE_REQUIRED, true));
        assert!(t.store().set(keys::CCD_BLOCKED, true));
        let mut handler = WpDisableMethodStateHandler::new(t.ctx.clone());
        assert_eq!(
            handler.initialize_state(),
            RmadErrorCode::StateHandlerInitializationFailed
        );

        assert!(t.store().set(keys::CCD_BLOCKED, false));
        assert_eq!(handler.initialize_state(), RmadErrorCode::Ok);
    }

    #[test]
    fn test_choices() {
        let t = TestContext::new();
        assert!(t.store().set(keys::WP_DISABLE_REQUIRED, true));
        assert!(t.store().set(keys::CCD_BLOCKED, false));
        let mut handler = WpDisableMethodStateHandler::new(t.ctx.clone());
        handler.initialize_state();

        let submit = |choice| RmadState::WpDisableMethod(WpDisableMethodState { choice });
        assert_eq!(
            handler.get_next_state_case(&submit(WpDisableMethodChoice::Unknown)).error,
            RmadErrorCode::RequestArgsMissing
        );
        assert_eq!(
            handler.get_next_state_case(&submit(WpDisableMethodChoice::Rsu)),
            GetNextStateCaseReply::next(StateCase::WpDisableRsu)
        );
        assert_eq!(
            handler.get_next_state_case(&submit(WpDisableMethodChoice::Physical)),
            GetNextStateCaseReply::next(StateCase::WpDisablePhysical)
        );
    }
}
