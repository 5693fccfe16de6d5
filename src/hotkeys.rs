use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    ToggleAutoComplete,
    AddSnippet,
}

/// Registers the global shortcuts and forwards presses to `tx` from a
/// polling thread. The returned manager must outlive the registration.
pub fn spawn_listener(tx: mpsc::Sender<HotkeyEvent>) -> Result<GlobalHotKeyManager, global_hotkey::Error> {
    let manager = GlobalHotKeyManager::new()?;
    let toggle = HotKey::new(Some(Modifiers::SUPER | Modifiers::CONTROL), Code::Slash);
    let add = HotKey::new(Some(Modifiers::SUPER | Modifiers::CONTROL), Code::PageUp);

    manager.register(toggle)?;
    manager.register(add)?;

    let _listener = thread::spawn(move || loop {
        if let Ok(event) = GlobalHotKeyEvent::receiver().try_recv() {
            let mapped = if event.state != HotKeyState::Pressed {
                None
            } else if event.id == toggle.id() {
                Some(HotkeyEvent::ToggleAutoComplete)
            } else if event.id == add.id() {
                Some(HotkeyEvent::AddSnippet)
            } else {
                None
            };
            if let Some(mapped) = mapped {
                if tx.send(mapped).is_err() {
                    break;
                }
            }
        }
        thread::sleep(POLL_INTERVAL);
    });

    Ok(manager)
}
