use std::io::{self, IsTerminal, Write};

use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::color::hex_to_rgb;
use crate::config::Config;
use crate::datetime::{format_date, format_time};
use crate::filter::TodayStats;
use crate::store::FolderStore;
use crate::task::{Folder, Task};

const SHORT_ID_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    /// Color needs both the `color` setting and a terminal on stdout.
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.color && io::stdout().is_terminal(),
        }
    }

    #[tracing::instrument(skip(self, tasks, folders))]
    pub fn print_task_table(
        &mut self,
        tasks: &[&Task],
        folders: &FolderStore,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if tasks.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = ["ID", "", "Date", "Time", "Folder", "Title"]
            .map(str::to_string)
            .to_vec();
        let rows = tasks
            .iter()
            .map(|task| self.task_row(task, folders, today))
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    pub fn print_dashboard(&mut self, stats: TodayStats, today: NaiveDate) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", dashboard_line(stats, today))?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task, folders))]
    pub fn print_task_info(&mut self, task: &Task, folders: &FolderStore) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let folder_id = task.folder_id.as_deref();
        let folder = match (folder_id, folders.name_of(folder_id)) {
            (Some(_), Some(name)) => name.to_string(),
            (Some(id), None) => format!("{id} (missing)"),
            (None, _) => String::new(),
        };

        writeln!(out, "id        {}", task.id)?;
        writeln!(out, "title     {}", task.title)?;
        writeln!(out, "status    {}", if task.completed { "completed" } else { "open" })?;
        writeln!(
            out,
            "date      {}",
            task.date.map(format_date).unwrap_or_default()
        )?;
        writeln!(
            out,
            "time      {}",
            task.time.map(format_time).unwrap_or_default()
        )?;
        writeln!(
            out,
            "folder    {} {}",
            self.swatch(folders.color_of(folder_id)),
            folder
        )?;
        writeln!(out, "memo      {}", task.memo.clone().unwrap_or_default())?;
        Ok(())
    }

    pub fn print_folders(&mut self, folders: &[Folder], tasks: &[Task]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let headers = ["ID", "Folder", "Color", "Tasks"].map(str::to_string).to_vec();
        let rows = folders
            .iter()
            .map(|folder| {
                let count = tasks
                    .iter()
                    .filter(|t| t.folder_id.as_deref() == Some(folder.id.as_str()))
                    .count();
                vec![
                    folder.id.clone(),
                    format!("{} {}", self.swatch(&folder.color), folder.name),
                    folder.color.clone(),
                    count.to_string(),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    fn task_row(&self, task: &Task, folders: &FolderStore, today: NaiveDate) -> Vec<String> {
        let id = self.paint(short_id(&task.id), "33");
        let check = if task.completed { "[x]" } else { "[ ]" }.to_string();

        let date = task.date.map(format_date).unwrap_or_default();
        let date = match task.date {
            Some(d) if d < today && !task.completed => self.paint(&date, "31"),
            _ => date,
        };
        let time = task.time.filter(|_| task.date.is_some()).map(format_time).unwrap_or_default();

        let folder_id = task.folder_id.as_deref();
        let folder = format!(
            "{} {}",
            self.swatch(folders.color_of(folder_id)),
            folders.name_of(folder_id).unwrap_or("-")
        );

        let title = if task.completed {
            self.paint(&task.title, "9")
        } else {
            task.title.clone()
        };

        vec![id, check, date, time, folder, title]
    }

    fn swatch(&self, color: &str) -> String {
        match hex_to_rgb(color) {
            Some((r, g, b)) => self.paint("●", &format!("38;2;{r};{g};{b}")),
            None => "●".to_string(),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

pub fn dashboard_line(stats: TodayStats, today: NaiveDate) -> String {
    format!(
        "Today {}: {} of {} done",
        format_date(today),
        stats.completed,
        stats.total
    )
}

fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (idx, header) in headers.iter().enumerate() {
        let padding = widths[idx].saturating_sub(UnicodeWidthStr::width(header.as_str()));
        write!(writer, "{}{} ", header, " ".repeat(padding))?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_characters_are_padded_by_display_width() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["Folder".to_string(), "N".to_string()],
            vec![
                vec!["업무".to_string(), "1".to_string()],
                vec!["\x1b[33mwork\x1b[0m".to_string(), "2".to_string()],
            ],
        )
        .expect("write table");

        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Folder N ");
        assert_eq!(lines[1], "------ - ");
        assert_eq!(lines[2], "업무   1 ");
        assert_eq!(strip_ansi(lines[3]), "work   2 ");
    }

    #[test]
    fn short_id_keeps_eight_characters() {
        assert_eq!(short_id("0f8e6a1c-aaaa-bbbb"), "0f8e6a1c");
        assert_eq!(short_id("f1"), "f1");
    }

    #[test]
    fn dashboard_reads_naturally() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).expect("valid date");
        let stats = TodayStats {
            total: 3,
            completed: 1,
        };
        assert_eq!(dashboard_line(stats, today), "Today 2024-06-10: 1 of 3 done");
    }

    #[test]
    fn plain_renderer_leaves_text_alone() {
        let renderer = Renderer { color: false };
        assert_eq!(renderer.paint("x", "31"), "x");
        assert_eq!(renderer.swatch("#E1F5FE"), "●");
    }
}
