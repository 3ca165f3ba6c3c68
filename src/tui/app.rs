//! Debugger application state and logic.

use crate::asm::disasm::{disassemble_at, format_instruction};
use crate::cpu::output::Captured;
use crate::cpu::memory::MEMORY_SIZE;
use crate::Cpu;
use std::collections::HashSet;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Original program for reference.
    pub program: Vec<u8>,
    /// Program output so far.
    pub output: Captured,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<usize>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset, in rows of 8 bytes.
    pub mem_scroll: usize,
}

/// Bytes shown per memory row.
pub const MEM_ROW_WIDTH: usize = 8;

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(program: Vec<u8>) -> Self {
        let mut app = Self {
            cpu: Cpu::new(),
            program,
            output: Captured::default(),
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status: String::new(),
            mem_scroll: 0,
        };
        app.reset();
        app.status = "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into();
        app
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if !self.cpu.is_running() {
            self.status = format!("CPU stopped: {:?}", self.cpu.state);
            self.running = false;
            return;
        }

        let pc = self.cpu.pc;
        match self.cpu.step(&mut self.output) {
            Ok(instr) => {
                self.status = format!("PC={:02X}: {}", pc, format_instruction(&instr));
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
    }

    /// Run until halt, breakpoint, or error.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if !self.cpu.is_running() {
            self.running = false;
            self.status = format!("Stopped after {} cycles ({:?})", self.cpu.cycles, self.cpu.state);
            return;
        }

        self.step();

        if self.running && self.breakpoints.contains(&self.cpu.pc) {
            self.running = false;
            self.status = format!("Breakpoint at PC={:02X}", self.cpu.pc);
        }
    }

    /// Toggle breakpoint at the current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.pc;
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={:02X}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={:02X}", pc);
        }
    }

    /// Reset CPU to initial state and reload the program.
    pub fn reset(&mut self) {
        self.cpu = Cpu::new();
        self.output = Captured::default();
        self.running = false;
        self.status = match self.cpu.load_program(&self.program) {
            Ok(()) => "Reset. Ready.".into(),
            Err(e) => format!("Error: {}", e),
        };
    }

    /// Scroll the memory view.
    pub fn scroll_memory(&mut self, down: bool) {
        let max = MEMORY_SIZE / MEM_ROW_WIDTH - 1;
        self.mem_scroll = if down {
            (self.mem_scroll + 1).min(max)
        } else {
            self.mem_scroll.saturating_sub(1)
        };
    }

    /// Get disassembly starting at the current PC.
    ///
    /// Instructions are variable length, so the listing walks forward
    /// from the PC rather than centring on it.
    pub fn get_disassembly(&self, lines: usize) -> Vec<(usize, String, bool)> {
        let image = self.cpu.mem.as_slice();
        let mut addr = self.cpu.pc;
        let mut listing = Vec::with_capacity(lines);

        while listing.len() < lines && addr < MEMORY_SIZE {
            let (text, len) = disassemble_at(image, addr);
            listing.push((addr, text, addr == self.cpu.pc));
            addr += len;
        }

        listing
    }
}

/// Run the debugger with a program.
pub fn run_debugger(program: Vec<u8>) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = DebuggerApp::new(program);

    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Up => app.scroll_memory(false),
                        KeyCode::Down => app.scroll_memory(true),
                        _ => {}
                    }
                }
            }
        }

        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
