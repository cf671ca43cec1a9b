//! Detoured entry points
//!
//! One `extern "system"` function per intercepted API, each with the exact
//! signature of the function it replaces. A detour loads the original from
//! its slot, then hands the call to the installed [`InputFilter`]. With no
//! filter installed it is a plain passthrough.
//!
//! [`InputFilter`]: super::InputFilter

use std::sync::atomic::{AtomicPtr, Ordering};

use camhook_sdk::apis::{
    GET_MESSAGE_A, GET_MESSAGE_W, PEEK_MESSAGE_A, PEEK_MESSAGE_W, USER32, XINPUT_GET_STATE,
};
use camhook_sdk::{
    Bool, GetMessageFn, Hwnd, Msg, PeekMessageFn, XInputGetStateFn, XInputState,
    ERROR_DEVICE_NOT_CONNECTED, FALSE,
};

use crate::config::CoreConfig;
use crate::hooks::{HookTarget, SubstitutionRegistry};

/// Storage for the callable original of one detoured function
pub struct OriginalSlot(AtomicPtr<()>);

impl OriginalSlot {
    pub const fn new() -> Self {
        Self(AtomicPtr::new(std::ptr::null_mut()))
    }

    pub fn set(&self, original: *const ()) {
        self.0.store(original as *mut (), Ordering::Release);
    }

    pub fn clear(&self) {
        self.set(std::ptr::null());
    }

    pub fn get(&self) -> Option<*const ()> {
        let ptr = self.0.load(Ordering::Acquire);
        (!ptr.is_null()).then_some(ptr as *const ())
    }
}

impl Default for OriginalSlot {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! message_detour {
    (GetMessage $name:ident) => {
        paste::paste! {
            pub static [<$name:upper _ORIGINAL>]: OriginalSlot = OriginalSlot::new();

            pub unsafe extern "system" fn [<detour_ $name>](
                msg: *mut Msg,
                hwnd: Hwnd,
                filter_min: u32,
                filter_max: u32,
            ) -> Bool {
                let Some(ptr) = [<$name:upper _ORIGINAL>].get() else {
                    return FALSE;
                };
                let original: GetMessageFn = std::mem::transmute(ptr);
                let call = || original(msg, hwnd, filter_min, filter_max);

                match super::filter() {
                    Some(filter) => filter.on_get_message(msg, call),
                    None => call(),
                }
            }
        }
    };
    (PeekMessage $name:ident) => {
        paste::paste! {
            pub static [<$name:upper _ORIGINAL>]: OriginalSlot = OriginalSlot::new();

            pub unsafe extern "system" fn [<detour_ $name>](
                msg: *mut Msg,
                hwnd: Hwnd,
                filter_min: u32,
                filter_max: u32,
                remove: u32,
            ) -> Bool {
                let Some(ptr) = [<$name:upper _ORIGINAL>].get() else {
                    return FALSE;
                };
                let original: PeekMessageFn = std::mem::transmute(ptr);
                let call = || original(msg, hwnd, filter_min, filter_max, remove);

                match super::filter() {
                    Some(filter) => filter.on_peek_message(msg, remove, call),
                    None => call(),
                }
            }
        }
    };
}

message_detour!(GetMessage get_message_a);
message_detour!(GetMessage get_message_w);
message_detour!(PeekMessage peek_message_a);
message_detour!(PeekMessage peek_message_w);

pub static XINPUT_GET_STATE_ORIGINAL: OriginalSlot = OriginalSlot::new();

pub unsafe extern "system" fn detour_xinput_get_state(
    user_index: u32,
    state: *mut XInputState,
) -> u32 {
    let Some(ptr) = XINPUT_GET_STATE_ORIGINAL.get() else {
        return ERROR_DEVICE_NOT_CONNECTED;
    };
    let original: XInputGetStateFn = std::mem::transmute(ptr);
    let call = || original(user_index, state);

    match super::filter() {
        Some(filter) => filter.on_get_state(state, call),
        None => call(),
    }
}

/// An API to intercept, its detour, and where its original goes
#[derive(Clone, Copy)]
pub struct HookRecord<'a> {
    pub target: HookTarget<'a>,
    pub detour: *const (),
    pub slot: &'static OriginalSlot,
}

/// The five intercepted APIs, with XInputGetState taken from `xinput_module`
pub fn hook_records(xinput_module: &str) -> [HookRecord<'_>; 5] {
    [
        HookRecord {
            target: HookTarget::new(USER32, GET_MESSAGE_A),
            detour: detour_get_message_a as *const (),
            slot: &GET_MESSAGE_A_ORIGINAL,
        },
        HookRecord {
            target: HookTarget::new(USER32, GET_MESSAGE_W),
            detour: detour_get_message_w as *const (),
            slot: &GET_MESSAGE_W_ORIGINAL,
        },
        HookRecord {
            target: HookTarget::new(USER32, PEEK_MESSAGE_A),
            detour: detour_peek_message_a as *const (),
            slot: &PEEK_MESSAGE_A_ORIGINAL,
        },
        HookRecord {
            target: HookTarget::new(USER32, PEEK_MESSAGE_W),
            detour: detour_peek_message_w as *const (),
            slot: &PEEK_MESSAGE_W_ORIGINAL,
        },
        HookRecord {
            target: HookTarget::new(xinput_module, XINPUT_GET_STATE),
            detour: detour_xinput_get_state as *const (),
            slot: &XINPUT_GET_STATE_ORIGINAL,
        },
    ]
}

/// Outcome of [`install_input_hooks`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Targets whose substitute was registered, as `module!symbol`
    pub installed: Vec<String>,
    /// Targets that could not be registered, with the reason
    pub failed: Vec<(String, String)>,
    /// Whether the registered substitutes were activated
    pub activated: bool,
}

impl InstallReport {
    /// True if every target was registered and activated
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.activated
    }
}

/// Register all five input detours with `registry`, then activate them
///
/// XInputGetState is taken from `config.xinput_module`. A target that fails to register is logged and skipped; the rest are
/// still installed. Activation runs once, after all registrations, and only
/// if at least one succeeded.
pub fn install_input_hooks<R: SubstitutionRegistry>(
    registry: &mut R,
    config: &CoreConfig,
) -> InstallReport {
    install_records(registry, &hook_records(&config.xinput_module))
}

fn install_records<R: SubstitutionRegistry>(
    registry: &mut R,
    records: &[HookRecord<'_>],
) -> InstallReport {
    let mut report = InstallReport::default();

    for record in records {
        let name = record.target.to_string();
        // SAFETY: every detour in the table matches its target's signature
        match unsafe { registry.register(record.target, record.detour) } {
            Ok(original) => {
                record.slot.set(original);
                tracing::debug!("Registered input hook {}", name);
                report.installed.push(name);
            }
            Err(e) => {
                tracing::error!("Failed to hook {}: {}", name, e);
                report.failed.push((name, e.to_string()));
            }
        }
    }

    if report.installed.is_empty() {
        tracing::warn!("No input hooks registered; nothing to activate");
        return report;
    }

    match registry.activate_all() {
        Ok(()) => {
            report.activated = true;
            tracing::info!("Activated {} input hooks", report.installed.len());
        }
        Err(e) => tracing::error!("Failed to activate input hooks: {}", e),
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::HookError;
    use camhook_engine::ResolveError;
    use camhook_sdk::apis::XINPUT_DEFAULT;
    use camhook_sdk::{ERROR_SUCCESS, TRUE};

    #[derive(Default)]
    struct FakeRegistry {
        fail_symbol: Option<&'static str>,
        fail_activation: bool,
        registered: Vec<String>,
        activations: usize,
    }

    impl SubstitutionRegistry for FakeRegistry {
        unsafe fn register(
            &mut self,
            target: HookTarget<'_>,
            detour: *const (),
        ) -> Result<*const (), HookError> {
            if Some(target.symbol) == self.fail_symbol {
                return Err(HookError::Resolve(ResolveError::ExportNotFound {
                    module: target.module.to_string(),
                    symbol: target.symbol.to_string(),
                }));
            }
            self.registered.push(target.to_string());
            Ok(detour)
        }

        fn activate_all(&mut self) -> Result<(), HookError> {
            self.activations += 1;
            if self.fail_activation {
                Err(HookError::EnableFailed("patch rejected".to_string()))
            } else {
                Ok(())
            }
        }
    }

    static TEST_SLOTS: [OriginalSlot; 5] = [
        OriginalSlot::new(),
        OriginalSlot::new(),
        OriginalSlot::new(),
        OriginalSlot::new(),
        OriginalSlot::new(),
    ];

    fn test_records(slots: &'static [OriginalSlot; 5]) -> Vec<HookRecord<'static>> {
        hook_records(XINPUT_DEFAULT)
            .iter()
            .zip(slots.iter())
            .map(|(record, slot)| HookRecord { slot, ..*record })
            .collect()
    }

    #[test]
    fn test_hook_records_cover_all_apis() {
        let records = hook_records("xinput1_4");
        let names: Vec<String> = records.iter().map(|r| r.target.to_string()).collect();
        assert_eq!(
            names,
            [
                "user32!GetMessageA",
                "user32!GetMessageW",
                "user32!PeekMessageA",
                "user32!PeekMessageW",
                "xinput1_4!XInputGetState",
            ]
        );
    }

    #[test]
    fn test_failed_target_does_not_stop_the_rest() {
        static SLOTS: [OriginalSlot; 5] = [
            OriginalSlot::new(),
            OriginalSlot::new(),
            OriginalSlot::new(),
            OriginalSlot::new(),
            OriginalSlot::new(),
        ];
        let mut registry = FakeRegistry {
            fail_symbol: Some(PEEK_MESSAGE_A),
            ..Default::default()
        };

        let report = install_records(&mut registry, &test_records(&SLOTS));

        assert_eq!(report.installed.len(), 4);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "user32!PeekMessageA");
        assert!(report.failed[0].1.contains("PeekMessageA"));
        assert!(report.activated);
        assert!(!report.is_complete());
        assert_eq!(registry.activations, 1);
        assert_eq!(registry.registered.len(), 4);
        assert!(SLOTS[2].get().is_none());
        assert!(SLOTS.iter().filter(|s| s.get().is_some()).count() == 4);
    }

    #[test]
    fn test_activation_failure_reported() {
        let mut registry = FakeRegistry {
            fail_activation: true,
            ..Default::default()
        };

        let report = install_records(&mut registry, &test_records(&TEST_SLOTS));

        assert_eq!(report.installed.len(), 5);
        assert!(report.failed.is_empty());
        assert!(!report.activated);
        assert_eq!(registry.activations, 1);
    }

    struct Refusing(usize);

    impl SubstitutionRegistry for Refusing {
        unsafe fn register(
            &mut self,
            _target: HookTarget<'_>,
            _detour: *const (),
        ) -> Result<*const (), HookError> {
            Err(HookError::UnsupportedArch)
        }

        fn activate_all(&mut self) -> Result<(), HookError> {
            self.0 += 1;
            Ok(())
        }
    }

    #[test]
    fn test_nothing_registered_skips_activation() {
        static SLOTS: [OriginalSlot; 5] = [
            OriginalSlot::new(),
            OriginalSlot::new(),
            OriginalSlot::new(),
            OriginalSlot::new(),
            OriginalSlot::new(),
        ];
        let mut registry = Refusing(0);
        let report = install_records(&mut registry, &test_records(&SLOTS));

        assert!(report.installed.is_empty());
        assert_eq!(report.failed.len(), 5);
        assert!(!report.activated);
        assert_eq!(registry.0, 0);
    }

    #[test]
    fn test_install_uses_configured_xinput_module() {
        let config = CoreConfig {
            xinput_module: "xinput1_3".to_string(),
            ..Default::default()
        };
        let mut registry = Refusing(0);

        let report = install_input_hooks(&mut registry, &config);

        let failed: Vec<&str> = report.failed.iter().map(|(name, _)| name.as_str()).collect();
        assert!(failed.contains(&"xinput1_3!XInputGetState"));
        assert!(failed.contains(&"user32!GetMessageW"));
    }

    #[test]
    fn test_original_slot() {
        let slot = OriginalSlot::new();
        assert!(slot.get().is_none());

        let value = 7u32;
        slot.set(&value as *const u32 as *const ());
        assert_eq!(slot.get(), Some(&value as *const u32 as *const ()));

        slot.clear();
        assert!(slot.get().is_none());
    }

    unsafe extern "system" fn fake_peek(
        msg: *mut Msg,
        hwnd: Hwnd,
        _min: u32,
        _max: u32,
        _remove: u32,
    ) -> Bool {
        *msg = Msg::new(hwnd, camhook_sdk::messages::WM_KEYDOWN, 0x41, 0);
        TRUE
    }

    unsafe extern "system" fn fake_get_state(user_index: u32, state: *mut XInputState) -> u32 {
        (*state).dw_packet_number = user_index + 100;
        ERROR_SUCCESS
    }

    // No filter is installed in this test binary, so detours pass through
    #[test]
    fn test_detours_pass_through_without_filter() {
        assert!(super::super::filter().is_none());

        PEEK_MESSAGE_W_ORIGINAL.set(fake_peek as *const ());
        let mut msg = Msg::default();
        let hwnd = 0x10 as Hwnd;
        let result = unsafe { detour_peek_message_w(&mut msg, hwnd, 0, 0, 1) };
        assert_eq!(result, TRUE);
        assert_eq!(msg.message, camhook_sdk::messages::WM_KEYDOWN);
        assert_eq!(msg.hwnd, hwnd);

        XINPUT_GET_STATE_ORIGINAL.set(fake_get_state as *const ());
        let mut state = XInputState::default();
        let result = unsafe { detour_xinput_get_state(2, &mut state) };
        assert_eq!(result, ERROR_SUCCESS);
        assert_eq!(state.dw_packet_number, 102);
    }

    #[test]
    fn test_detour_without_original() {
        let mut msg = Msg::default();
        let result = unsafe { detour_get_message_a(&mut msg, std::ptr::null_mut(), 0, 0) };
        assert_eq!(result, FALSE);
    }
}
