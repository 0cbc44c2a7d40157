use std::fs::File;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::config::{default_settings_path, load_settings, Cli, Settings};
use crate::input::InputEvent;
use crate::scene::{Driver, PoolSizes};
use crate::terminal::{map_event, Terminal, TerminalClock, TerminalListeners};

const POLL: Duration = Duration::from_millis(2);
const DENSITY_STEP: f32 = 0.1;

enum KeyAction {
    Quit,
    ToggleWeather,
    ToggleReflections,
    ToggleSpeedLines,
    Density(f32),
    ToggleHud,
    Boost,
}

fn map_key(k: &KeyEvent) -> Option<KeyAction> {
    if !(k.kind == KeyEventKind::Press || k.kind == KeyEventKind::Repeat) {
        return None;
    }
    if matches!(k.code, KeyCode::Char('c')) && k.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(KeyAction::Quit);
    }
    Some(match k.code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => KeyAction::Quit,
        KeyCode::Char('w') | KeyCode::Char('W') => KeyAction::ToggleWeather,
        KeyCode::Char('r') | KeyCode::Char('R') => KeyAction::ToggleReflections,
        KeyCode::Char('s') | KeyCode::Char('S') => KeyAction::ToggleSpeedLines,
        KeyCode::Char('+') | KeyCode::Char('=') => KeyAction::Density(DENSITY_STEP),
        KeyCode::Char('-') | KeyCode::Char('_') => KeyAction::Density(-DENSITY_STEP),
        KeyCode::Char('h') | KeyCode::Char('H') => KeyAction::ToggleHud,
        _ => KeyAction::Boost,
    })
}

fn init_logging(path: Option<&Path>) -> anyhow::Result<()> {
    // stderr shares the alternate screen, so logging is off unless asked for
    let default = if path.is_some() { "info" } else { "off" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default));
    if let Some(p) = path {
        let file = File::create(p).with_context(|| format!("opening log file {}", p.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.try_init().context("installing logger")?;
    Ok(())
}

fn resolve_settings(cli: &Cli) -> Settings {
    let path = match &cli.config {
        Some(p) => Some(p.clone()),
        None => match default_settings_path() {
            Ok(p) => Some(p),
            Err(e) => {
                log::warn!("{e:#}; using defaults");
                None
            }
        },
    };
    let base = match &path {
        Some(p) => {
            log::info!("settings from {}", p.display());
            load_settings(p)
        }
        None => Settings::default(),
    };
    cli.apply(base).sanitized()
}

pub(crate) struct App {
    driver: Driver<Terminal, TerminalClock, TerminalListeners>,
    should_quit: bool,
}

impl App {
    fn init(cli: &Cli) -> anyhow::Result<Self> {
        let settings = resolve_settings(cli);
        let term = Terminal::begin().context("terminal unavailable")?;
        let viewport = term.viewport();
        let mut driver = Driver::new(
            settings,
            PoolSizes::default(),
            Some(term),
            viewport,
            TerminalClock::new(),
            TerminalListeners::default(),
        );
        driver.set_hud(!cli.no_hud);
        Ok(Self {
            driver,
            should_quit: false,
        })
    }

    fn run(&mut self) -> anyhow::Result<()> {
        self.driver.start();
        while !self.should_quit {
            while event::poll(POLL)? {
                let ev = event::read()?;
                self.on_event(&ev);
                if self.should_quit {
                    break;
                }
            }
            if !self.driver.is_running() {
                break;
            }
            if self.driver.clock_mut().take_request() {
                self.driver.tick();
            }
        }
        Ok(())
    }

    fn on_event(&mut self, ev: &Event) {
        if let Event::Key(k) = ev {
            if let Some(action) = map_key(k) {
                self.on_key(action);
            }
            return;
        }
        if let Event::Resize(cols, rows) = ev {
            if let Some(term) = self.driver.surface_mut() {
                term.resize(*cols, *rows);
            }
        }
        if let Some(input) = map_event(ev) {
            self.driver.handle_input(&input);
        }
    }

    fn on_key(&mut self, action: KeyAction) {
        let mut s = self.driver.scene().settings.clone();
        match action {
            KeyAction::Quit => {
                self.should_quit = true;
                return;
            }
            KeyAction::Boost => {
                self.driver.handle_input(&InputEvent::KeyPress);
                return;
            }
            KeyAction::ToggleHud => {
                let on = !self.driver.scene().show_hud;
                self.driver.set_hud(on);
                return;
            }
            KeyAction::ToggleWeather => s.weather_enabled = !s.weather_enabled,
            KeyAction::ToggleReflections => s.reflections_enabled = !s.reflections_enabled,
            KeyAction::ToggleSpeedLines => s.speed_lines_enabled = !s.speed_lines_enabled,
            KeyAction::Density(d) => s.particle_density += d,
        }
        log::info!(
            "settings: weather {} reflections {} speed lines {} density {:.1}",
            s.weather_enabled,
            s.reflections_enabled,
            s.speed_lines_enabled,
            s.particle_density
        );
        self.driver.set_settings(s);
    }

    fn shutdown(&mut self) -> anyhow::Result<()> {
        self.driver.stop();
        if let Some(term) = self.driver.surface_mut() {
            term.end()?;
        }
        Ok(())
    }
}

pub(crate) fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;
    let mut app = App::init(&cli)?;
    let result = app.run();
    app.shutdown()?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn bound_keys_and_boost_fallback() {
        assert!(matches!(map_key(&press(KeyCode::Char('q'))), Some(KeyAction::Quit)));
        assert!(matches!(map_key(&press(KeyCode::Esc)), Some(KeyAction::Quit)));
        assert!(matches!(
            map_key(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(KeyAction::Quit)
        ));
        assert!(matches!(
            map_key(&press(KeyCode::Char('-'))),
            Some(KeyAction::Density(d)) if d < 0.0
        ));
        assert!(matches!(map_key(&press(KeyCode::Char(' '))), Some(KeyAction::Boost)));
        assert!(matches!(map_key(&press(KeyCode::Enter)), Some(KeyAction::Boost)));
    }

    #[test]
    fn key_releases_are_ignored() {
        let mut k = press(KeyCode::Char('w'));
        k.kind = KeyEventKind::Release;
        assert!(map_key(&k).is_none());
    }

    #[test]
    fn cli_layers_over_missing_file() {
        let cli = Cli::parse_from([
            "citydrive",
            "--config",
            "/definitely/not/here.json",
            "--density",
            "9",
            "--rain",
        ]);
        let s = resolve_settings(&cli);
        assert!(s.weather_enabled);
        assert_eq!(s.particle_density, crate::config::MAX_DENSITY);
    }
}
