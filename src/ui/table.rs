use super::SnapshotSink;
use crate::monitor::snapshot::{Direction, InstrumentRow, TickSnapshot, Zone};
use log::{info, warn};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::Constraint,
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Cell, Row, Table},
    Frame, Terminal, TerminalOptions, Viewport,
};
use std::io;

const COLUMN_WIDTHS: [Constraint; 8] = [
    Constraint::Length(12),
    Constraint::Length(12),
    Constraint::Length(12),
    Constraint::Length(10),
    Constraint::Length(12),
    Constraint::Length(10),
    Constraint::Length(10),
    Constraint::Length(10),
];

/// Draws the snapshot as a table in an inline region of the terminal.
pub struct TableSink<B: Backend> {
    terminal: Terminal<B>,
}

impl TableSink<CrosstermBackend<io::Stdout>> {
    /// Reserves enough lines on stdout for `instruments` rows.
    pub fn stdout(instruments: usize) -> io::Result<Self> {
        let height = instruments.min(u16::MAX as usize - 3) as u16 + 3;
        let backend = CrosstermBackend::new(io::stdout());
        let terminal = Terminal::with_options(
            backend,
            TerminalOptions {
                viewport: Viewport::Inline(height),
            },
        )?;
        Ok(Self { terminal })
    }
}

impl<B: Backend> TableSink<B> {
    pub fn new(terminal: Terminal<B>) -> Self {
        Self { terminal }
    }

    pub fn terminal(&self) -> &Terminal<B> {
        &self.terminal
    }
}

impl<B: Backend + Send> SnapshotSink for TableSink<B> {
    fn render(&mut self, snapshot: &TickSnapshot) {
        if let Err(e) = self.terminal.draw(|f| draw_table(f, snapshot)) {
            warn!("Failed to draw price table: {}", e);
        }
    }
}

fn draw_table<B: Backend>(f: &mut Frame<B>, snapshot: &TickSnapshot) {
    let block = Block::default().borders(Borders::ALL).title(format!(
        "Prices | Last update: {}",
        snapshot.taken_at.format("%H:%M:%S")
    ));

    let rows = snapshot.rows.iter().map(|row| {
        let change_color = match row.direction() {
            Direction::Up => Color::Green,
            Direction::Down => Color::Red,
            Direction::Neutral => Color::Gray,
        };
        let (zone_text, zone_color) = match row.zone() {
            Zone::Sell => ("SELL", Color::Red),
            Zone::Buy => ("BUY", Color::Blue),
            Zone::InRange => ("RANGE", Color::Yellow),
        };

        let symbol_style = if row.stale {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };

        Row::new(vec![
            Cell::from(Span::styled(row.symbol.clone(), symbol_style)),
            Cell::from(Span::styled(
                format_price(row.price),
                Style::default().fg(change_color),
            )),
            Cell::from(row.previous_price.map_or_else(|| "-".to_string(), format_price)),
            Cell::from(Span::styled(
                format_change(row),
                Style::default().fg(change_color),
            )),
            Cell::from(format_sma(row.sma)),
            Cell::from(format!("{:.2}", row.sell_price)),
            Cell::from(format!("{:.2}", row.buy_price)),
            Cell::from(Span::styled(zone_text, Style::default().fg(zone_color))),
        ])
    });

    let table = Table::new(rows)
        .header(
            Row::new(vec![
                "Symbol", "Price", "Previous", "Change", "SMA", "Sell", "Buy", "Zone",
            ])
            .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(block)
        .widths(&COLUMN_WIDTHS);

    f.render_widget(table, f.size());
}

/// Logs one line per instrument; used when stdout is not a terminal.
#[derive(Debug, Default)]
pub struct LogSink;

impl SnapshotSink for LogSink {
    fn render(&mut self, snapshot: &TickSnapshot) {
        for row in &snapshot.rows {
            info!(
                "{:<10} price={} prev={} change={} sma={} sell={:.2} buy={:.2}{}",
                row.symbol,
                format_price(row.price).trim(),
                row.previous_price
                    .map_or_else(|| "-".to_string(), |p| format_price(p).trim().to_string()),
                format_change(row).trim(),
                format_sma(row.sma).trim(),
                row.sell_price,
                row.buy_price,
                if row.stale { " (stale)" } else { "" }
            );
        }
    }
}

fn format_price(price: f64) -> String {
    if price > 1000.0 {
        format!("{:>10.2}", price)
    } else {
        format!("{:>10.4}", price)
    }
}

fn format_change(row: &InstrumentRow) -> String {
    let arrow = match row.direction() {
        Direction::Up => "▲",
        Direction::Down => "▼",
        Direction::Neutral => " ",
    };
    row.change_pct()
        .map_or_else(|| format!("{:>8}", "-"), |c| format!("{}{:>6.2}%", arrow, c))
}

fn format_sma(sma: f64) -> String {
    if sma == 0.0 {
        format!("{:>10}", "-")
    } else {
        format_price(sma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use ratatui::backend::TestBackend;

    fn snapshot() -> TickSnapshot {
        TickSnapshot {
            taken_at: Local::now(),
            rows: vec![
                InstrumentRow {
                    symbol: "PETR4.SA".to_string(),
                    price: 31.0,
                    previous_price: Some(29.5),
                    sma: 30.1,
                    sell_price: 30.0,
                    buy_price: 25.0,
                    stale: false,
                },
                InstrumentRow {
                    symbol: "VALE3.SA".to_string(),
                    price: 64.0,
                    previous_price: None,
                    sma: 0.0,
                    sell_price: 70.0,
                    buy_price: 65.0,
                    stale: true,
                },
            ],
        }
    }

    fn screen(sink: &TableSink<TestBackend>) -> String {
        sink.terminal()
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol.as_str())
            .collect()
    }

    #[test]
    fn table_lists_every_instrument_with_its_zone() {
        let mut sink = TableSink::new(Terminal::new(TestBackend::new(100, 6)).unwrap());

        sink.render(&snapshot());

        let screen = screen(&sink);
        assert!(screen.contains("Symbol"));
        assert!(screen.contains("PETR4.SA"));
        assert!(screen.contains("VALE3.SA"));
        assert!(screen.contains("SELL"));
        assert!(screen.contains("BUY"));
    }

    #[test]
    fn empty_snapshot_still_renders() {
        let mut sink = TableSink::new(Terminal::new(TestBackend::new(100, 4)).unwrap());
        sink.render(&TickSnapshot {
            taken_at: Local::now(),
            rows: Vec::new(),
        });
        assert!(screen(&sink).contains("Prices"));
    }

    #[test]
    fn formats_follow_price_magnitude() {
        assert_eq!(format_price(31.0).trim(), "31.0000");
        assert_eq!(format_price(64250.5).trim(), "64250.50");
        assert_eq!(format_sma(0.0).trim(), "-");
        assert_eq!(format_change(&snapshot().rows[1]).trim(), "-");
    }

    #[test]
    fn log_sink_accepts_any_snapshot() {
        let _ = env_logger::builder().is_test(true).try_init();
        LogSink.render(&snapshot());
    }
}
