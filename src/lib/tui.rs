use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::info;
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::Constraint,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Row, Table, TableState},
};
use std::io;

use crate::Result;
use crate::lib::output::{COLUMNS, ReportRow, ReportSink};
use crate::lib::verdict::Action;

/// Collects rows and shows them in an interactive table on finish
#[derive(Default)]
pub struct TableSink {
    rows: Vec<ReportRow>,
}

impl TableSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportSink for TableSink {
    fn write_row(&mut self, row: ReportRow) -> Result<()> {
        self.rows.push(row);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.rows.is_empty() {
            info!("No workloads to display");
            return Ok(());
        }
        display_table(&self.rows)?;
        Ok(())
    }
}

pub fn display_table(data: &[ReportRow]) -> io::Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, data);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res
}

fn action_color(action: Action) -> Color {
    match action {
        Action::Good => Color::Green,
        Action::NeedUpdate => Color::Yellow,
        Action::NeedRemove => Color::Red,
    }
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    data: &[ReportRow],
) -> io::Result<()> {
    let cells: Vec<[String; 8]> = data.iter().map(ReportRow::cells).collect();
    let last = data.len().saturating_sub(1);

    let mut state = TableState::default();
    state.select(Some(0));

    loop {
        terminal.draw(|f| {
            let area = f.area();

            let header_cells = COLUMNS.iter().map(|h| {
                Cell::from(*h).style(
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                )
            });
            let header = Row::new(header_cells)
                .style(Style::default().bg(Color::DarkGray))
                .height(1);

            let rows = data.iter().zip(&cells).map(|(item, cells)| {
                let color = action_color(item.verdict.action);
                let cells = cells.iter().enumerate().map(|(i, text)| {
                    let cell = Cell::from(text.clone());
                    // Action column
                    if i == 6 {
                        cell.style(Style::default().fg(color))
                    } else {
                        cell
                    }
                });
                Row::new(cells).height(1)
            });

            let table = Table::new(
                rows,
                [
                    Constraint::Percentage(12),
                    Constraint::Percentage(14),
                    Constraint::Percentage(9),
                    Constraint::Percentage(6),
                    Constraint::Percentage(12),
                    Constraint::Percentage(12),
                    Constraint::Percentage(9),
                    Constraint::Percentage(26),
                ],
            )
            .header(header)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Workload Resources Usage (Press 'q' to quit) "),
            )
            .row_highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol(">> ");

            f.render_stateful_widget(table, area, &mut state);
        })?;

        // Handle input
        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Down | KeyCode::Char('j') => {
                        let i = match state.selected() {
                            Some(i) if i < last => i + 1,
                            _ => 0,
                        };
                        state.select(Some(i));
                    }
                    KeyCode::Up | KeyCode::Char('k') => {
                        let i = match state.selected() {
                            Some(0) | None => last,
                            Some(i) => i - 1,
                        };
                        state.select(Some(i));
                    }
                    _ => {}
                }
            }
        }
    }
}
