//! Release naming and body text.

use crate::error::Result;
use crate::matrix::{BuildMatrix, Platform};
use handlebars::Handlebars;
use serde::Serialize;

const DEFAULT_BODY_TEMPLATE: &str = "\
## {{title}}

Standalone builds of the PDF to table converter. No Python installation is required.

### Downloads
{{#each platforms}}
- **{{display}}**: download `{{executable}}`{{#if windows}} and double-click it to start.{{else}}, run `chmod +x {{executable}}`, then start it with `./{{executable}}`.{{/if}}
{{/each}}

### Usage
1. Start the application for your platform.
2. Choose the input folder containing your PDF files.
3. Choose the output folder for the CSV files.
4. Click \"Process Files\" and wait for the completion message.
";

/// Release tag for a run: `v<run_number>`
pub fn release_tag(run_number: u64) -> String {
    format!("v{}", run_number)
}

/// Release title for a run: `PDF Processor v<run_number>`
pub fn release_title(run_number: u64) -> String {
    format!("PDF Processor {}", release_tag(run_number))
}

#[derive(Serialize)]
struct PlatformNotes<'a> {
    name: &'a str,
    display: &'a str,
    executable: &'a str,
    windows: bool,
}

#[derive(Serialize)]
struct BodyData<'a> {
    run_number: u64,
    tag: String,
    title: String,
    platforms: Vec<PlatformNotes<'a>>,
}

/// Render the release body.
///
/// `template` replaces the built-in text; it sees `run_number`, `tag`,
/// `title` and a `platforms` list with `name`, `display`, `executable` and
/// `windows` per entry.
pub fn render_release_body(
    run_number: u64,
    matrix: &BuildMatrix,
    template: Option<&str>,
) -> Result<String> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);

    let data = BodyData {
        run_number,
        tag: release_tag(run_number),
        title: release_title(run_number),
        platforms: matrix
            .jobs()
            .iter()
            .map(|job| PlatformNotes {
                name: job.platform.as_str(),
                display: job.platform.display_name(),
                executable: &job.executable_name,
                windows: job.platform == Platform::Windows,
            })
            .collect(),
    };

    Ok(handlebars.render_template(template.unwrap_or(DEFAULT_BODY_TEMPLATE), &data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_and_title_derive_from_run_number() {
        assert_eq!(release_tag(42), "v42");
        assert_eq!(release_title(42), "PDF Processor v42");
    }

    #[test]
    fn body_names_every_executable() {
        let body = render_release_body(42, &BuildMatrix::default(), None).unwrap();
        assert!(body.contains("## PDF Processor v42"));
        assert!(body.contains("extract_windows.exe"));
        assert!(body.contains("extract_linux"));
        assert!(body.contains("chmod +x extract_linux"));
    }

    #[test]
    fn custom_template_is_used() {
        let body = render_release_body(
            7,
            &BuildMatrix::default(),
            Some("{{tag}}:{{#each platforms}} {{executable}}{{/each}}"),
        )
        .unwrap();
        assert_eq!(body, "v7: extract_windows.exe extract_linux");
    }
}
