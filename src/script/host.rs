//! Embedded Lua 5.4 sandbox.
//!
//! Scripts see two tables:
//!
//! | Lua                      | Effect                                   |
//! |--------------------------|------------------------------------------|
//! | `pet.say(text)`          | [`HostApi::announce`] → `ShowMessage`    |
//! | `pet.setExpression(name)`| [`HostApi::set_expression`] → `UiUpdate` |
//! | `pet.setPosition(x, y)`  | [`HostApi::move_to`] → `MovePet`         |
//! | `pet.moveTo(x, y)`       | `setPosition` plus a log line            |
//! | `pet.getPosition()`      | `{ x = …, y = … }`, last known position  |
//! | `pet.log(message)`       | `log::info!`                             |
//! | `sys.getTime()`          | local time as `HH:MM:SS`                 |
//!
//! `os`, `io`, `debug`, `package`, `require`, `load`, `loadfile` and
//! `dofile` are removed at construction.  Every script runs under an
//! instruction budget, including the startup file run by
//! [`ScriptHost::run_init`] together with its `onInit` function.
//!
//! `mlua::Lua` is `!Send`; a [`ScriptHost`] stays on the foreground thread.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use mlua::{HookTriggers, Lua, Value};
use thiserror::Error;

use crate::bus::{Event, EventBus};

/// Instructions one script may execute before it is aborted.
pub const MAX_INSTRUCTIONS: u32 = 1_000_000;

const REMOVED_GLOBALS: &[&str] = &[
    "os", "io", "debug", "package", "require", "load", "loadfile", "dofile",
];

// ---------------------------------------------------------------------------
// ScriptError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum ScriptError {
    /// Building the sandbox failed.
    #[error("failed to set up script sandbox: {0}")]
    Setup(String),

    /// A script file could not be read.
    #[error("failed to load script file {0}")]
    Load(String),

    /// The script did not compile or raised an error.
    #[error("script failed: {0}")]
    Runtime(String),
}

// ---------------------------------------------------------------------------
// HostApi
// ---------------------------------------------------------------------------

/// Capabilities handed to scripts.  Built once by the orchestrator.
///
/// Clones share the last known window position.
#[derive(Clone)]
pub struct HostApi {
    bus: Arc<EventBus>,
    position: Arc<Mutex<(f32, f32)>>,
}

impl HostApi {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            position: Arc::new(Mutex::new((0.0, 0.0))),
        }
    }

    /// Show `text` in the pet's bubble.
    pub fn announce(&self, text: &str) {
        self.bus.push(Event::show_message(text));
    }

    /// Switch the pet to the named expression.
    pub fn set_expression(&self, name: &str) {
        self.bus.push(Event::ui_update(name));
    }

    /// Ask the front end to move the pet window.  The new position is
    /// visible to [`position`](Self::position) immediately.
    pub fn move_to(&self, x: f32, y: f32) {
        self.note_position(x, y);
        self.bus.push(Event::move_pet(x, y));
    }

    /// Record where the window actually is, without moving it.
    pub fn note_position(&self, x: f32, y: f32) {
        *self.position.lock().unwrap_or_else(PoisonError::into_inner) = (x, y);
    }

    pub fn position(&self) -> (f32, f32) {
        *self.position.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// ScriptHost
// ---------------------------------------------------------------------------

pub struct ScriptHost {
    lua: Lua,
    api: HostApi,
}

impl ScriptHost {
    pub fn new(api: HostApi) -> Result<Self, ScriptError> {
        let lua = Lua::new();
        install(&lua, api.clone()).map_err(|e| ScriptError::Setup(e.to_string()))?;
        Ok(Self { lua, api })
    }

    /// Run `source` to completion or until it errors or exhausts its budget.
    pub fn execute(&self, source: &str) -> Result<(), ScriptError> {
        self.budgeted(|| self.lua.load(source).set_name("=pet-script").exec())
    }

    /// Run the startup script at `path`, then its global `onInit` function
    /// if it defines one.  Both share one instruction budget.
    pub fn run_init(&self, path: &Path) -> Result<(), ScriptError> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| ScriptError::Load(format!("{}: {e}", path.display())))?;

        self.budgeted(|| {
            self.lua
                .load(source.as_str())
                .set_name(format!("@{}", path.display()))
                .exec()?;
            match self.lua.globals().get::<Value>("onInit")? {
                Value::Function(on_init) => on_init.call::<()>(()),
                _ => Ok(()),
            }
        })?;
        log::info!("script: ran init script {}", path.display());
        Ok(())
    }

    /// The capabilities scripts were given.
    pub fn api(&self) -> &HostApi {
        &self.api
    }

    fn budgeted(&self, run: impl FnOnce() -> mlua::Result<()>) -> Result<(), ScriptError> {
        self.lua.set_hook(
            HookTriggers::new().every_nth_instruction(MAX_INSTRUCTIONS),
            |_lua, _debug| {
                Err(mlua::Error::RuntimeError(format!(
                    "instruction limit exceeded ({MAX_INSTRUCTIONS})"
                )))
            },
        );
        let result = run();
        self.lua.remove_hook();

        result.map_err(|e| ScriptError::Runtime(e.to_string()))
    }
}

fn install(lua: &Lua, api: HostApi) -> mlua::Result<()> {
    let globals = lua.globals();
    for name in REMOVED_GLOBALS {
        globals.set(*name, Value::Nil)?;
    }

    let print = lua.create_function(|_, args: mlua::MultiValue| {
        let line = args
            .iter()
            .map(|v| v.to_string().unwrap_or_else(|_| v.type_name().to_string()))
            .collect::<Vec<_>>()
            .join("\t");
        log::info!("script: {line}");
        Ok(())
    })?;
    globals.set("print", print)?;

    let pet = lua.create_table()?;
    let say_api = api.clone();
    pet.set(
        "say",
        lua.create_function(move |_, text: String| {
            say_api.announce(&text);
            Ok(())
        })?,
    )?;
    let expression_api = api.clone();
    pet.set(
        "setExpression",
        lua.create_function(move |_, name: String| {
            expression_api.set_expression(&name);
            Ok(())
        })?,
    )?;
    let position_api = api.clone();
    pet.set(
        "setPosition",
        lua.create_function(move |_, (x, y): (f32, f32)| {
            position_api.move_to(x, y);
            Ok(())
        })?,
    )?;
    let move_api = api.clone();
    pet.set(
        "moveTo",
        lua.create_function(move |_, (x, y): (f32, f32)| {
            move_api.move_to(x, y);
            log::info!("script: moved to {x}, {y}");
            Ok(())
        })?,
    )?;
    pet.set(
        "getPosition",
        lua.create_function(move |lua, ()| {
            let (x, y) = api.position();
            let table = lua.create_table()?;
            table.set("x", x)?;
            table.set("y", y)?;
            Ok(table)
        })?,
    )?;
    pet.set(
        "log",
        lua.create_function(|_, message: String| {
            log::info!("script: {message}");
            Ok(())
        })?,
    )?;
    globals.set("pet", pet)?;

    let sys = lua.create_table()?;
    sys.set(
        "getTime",
        lua.create_function(|_, ()| Ok(chrono::Local::now().format("%H:%M:%S").to_string()))?,
    )?;
    globals.set("sys", sys)?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventKind;
    use crate::script::speech_script;

    fn host() -> (ScriptHost, Arc<EventBus>) {
        let bus = Arc::new(EventBus::new());
        let host = ScriptHost::new(HostApi::new(Arc::clone(&bus))).unwrap();
        (host, bus)
    }

    #[test]
    fn say_pushes_show_message() {
        let (host, bus) = host();
        host.execute("pet.say('hi there')").unwrap();
        let ev = bus.try_pop().unwrap();
        assert_eq!(ev.kind(), EventKind::ShowMessage);
        assert_eq!(ev.payload(), "hi there");
        assert!(bus.is_empty());
    }

    #[test]
    fn set_expression_pushes_ui_update() {
        let (host, bus) = host();
        host.execute("pet.setExpression('sleepy')").unwrap();
        let ev = bus.try_pop().unwrap();
        assert_eq!(ev.kind(), EventKind::UiUpdate);
        assert_eq!(ev.payload(), "sleepy");
    }

    #[test]
    fn escaped_speech_round_trips_through_lua() {
        let (host, bus) = host();
        let tricky = "it's a \\ test\nwith 'quotes'\tand tabs\r\n nul\u{0}42";
        host.execute(&speech_script(tricky)).unwrap();
        assert_eq!(bus.try_pop().unwrap().payload(), tricky);
    }

    #[test]
    fn get_time_returns_clock_string() {
        let (host, bus) = host();
        host.execute("pet.say(sys.getTime())").unwrap();
        let text = bus.try_pop().unwrap().into_payload();
        assert_eq!(text.len(), 8);
        assert_eq!(text.matches(':').count(), 2);
    }

    #[test]
    fn dangerous_globals_are_gone() {
        let (host, _bus) = host();
        for name in REMOVED_GLOBALS {
            host.execute(&format!("assert({name} == nil, '{name} still present')"))
                .unwrap();
        }
        assert!(host.execute("os.exit(1)").is_err());
    }

    #[test]
    fn runtime_errors_are_reported_not_fatal() {
        let (host, bus) = host();
        let err = host.execute("error('boom')").unwrap_err();
        assert!(matches!(err, ScriptError::Runtime(ref m) if m.contains("boom")));
        assert!(matches!(
            host.execute("pet.say("),
            Err(ScriptError::Runtime(_))
        ));
        // The host keeps working afterwards.
        host.execute("pet.say('still alive')").unwrap();
        assert_eq!(bus.try_pop().unwrap().payload(), "still alive");
    }

    #[test]
    fn log_goes_to_the_logger_not_the_bus() {
        let (host, bus) = host();
        host.execute("pet.log('just a note')").unwrap();
        host.execute("pet.log(42)").unwrap();
        assert!(bus.is_empty());
    }

    #[test]
    fn set_position_pushes_move_and_updates_position() {
        let (host, bus) = host();
        host.execute("pet.setPosition(10, 20)").unwrap();
        let ev = bus.try_pop().unwrap();
        assert_eq!(ev.kind(), EventKind::MovePet);
        assert_eq!(ev.position(), Some((10.0, 20.0)));
        assert_eq!(host.api().position(), (10.0, 20.0));

        host.execute("local p = pet.getPosition(); assert(p.x == 10 and p.y == 20)")
            .unwrap();
    }

    #[test]
    fn move_to_moves_like_set_position() {
        let (host, bus) = host();
        host.execute("pet.moveTo(300, 150.5)").unwrap();
        assert_eq!(bus.try_pop().unwrap().position(), Some((300.0, 150.5)));
        assert!(bus.is_empty());
        assert_eq!(host.api().position(), (300.0, 150.5));
    }

    #[test]
    fn get_position_reflects_the_window_not_just_scripts() {
        let (host, bus) = host();
        host.execute("local p = pet.getPosition(); assert(p.x == 0 and p.y == 0)")
            .unwrap();
        host.api().note_position(64.0, 32.0);
        host.execute("local p = pet.getPosition(); pet.say(p.x + p.y)").unwrap();
        assert_eq!(bus.try_pop().unwrap().payload(), "96.0");
    }

    #[test]
    fn set_position_rejects_non_numbers() {
        let (host, bus) = host();
        assert!(host.execute("pet.setPosition('left', 'top')").is_err());
        assert!(bus.is_empty());
    }

    fn script_file(source: &str) -> tempfile::NamedTempFile {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(source.as_bytes()).unwrap();
        file
    }

    #[test]
    fn init_script_runs_then_on_init_is_called() {
        let (host, bus) = host();
        let file = script_file(
            "pet.say('loaded')\n\
             function onInit() pet.setExpression('awake') end\n",
        );
        host.run_init(file.path()).unwrap();

        let first = bus.try_pop().unwrap();
        assert_eq!(first.kind(), EventKind::ShowMessage);
        assert_eq!(first.payload(), "loaded");
        let second = bus.try_pop().unwrap();
        assert_eq!(second.kind(), EventKind::UiUpdate);
        assert_eq!(second.payload(), "awake");
        assert!(bus.is_empty());
    }

    #[test]
    fn init_script_without_on_init_is_fine() {
        let (host, bus) = host();
        let file = script_file("onInit = 'not a function'\npet.say('only the body')");
        host.run_init(file.path()).unwrap();
        assert_eq!(bus.try_pop().unwrap().payload(), "only the body");
        assert!(bus.is_empty());
    }

    #[test]
    fn init_definitions_stay_available_to_later_scripts() {
        let (host, bus) = host();
        let file = script_file("function greet(name) pet.say('hi ' .. name) end");
        host.run_init(file.path()).unwrap();
        host.execute("greet('pip')").unwrap();
        assert_eq!(bus.try_pop().unwrap().payload(), "hi pip");
    }

    #[test]
    fn missing_init_script_is_a_load_error() {
        let (host, _bus) = host();
        let dir = tempfile::tempdir().unwrap();
        let err = host.run_init(&dir.path().join("init.lua")).unwrap_err();
        assert!(matches!(err, ScriptError::Load(ref m) if m.contains("init.lua")));
        host.execute("pet.say('still usable')").unwrap();
    }

    #[test]
    fn failing_on_init_is_a_runtime_error() {
        let (host, _bus) = host();
        let file = script_file("function onInit() error('bad start') end");
        let err = host.run_init(file.path()).unwrap_err();
        assert!(matches!(err, ScriptError::Runtime(ref m) if m.contains("bad start")));
    }

    #[test]
    fn runaway_on_init_hits_instruction_limit() {
        let (host, _bus) = host();
        let file = script_file("function onInit() while true do end end");
        let err = host.run_init(file.path()).unwrap_err();
        assert!(err.to_string().contains("instruction limit"));
        host.execute("local x = 1").unwrap();
    }

    #[test]
    fn infinite_loop_hits_instruction_limit() {
        let (host, _bus) = host();
        let err = host.execute("while true do end").unwrap_err();
        assert!(err.to_string().contains("instruction limit"));
        host.execute("local x = 1").unwrap();
    }
}
