use std::io::{self, BufRead, BufReader, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::warn;

use super::{
    DuplicateDecision, InteractionGateway, InteractionRequest, InteractionResponse, MergeDecision,
    RankedChoice, TranslateDecision,
};

struct ConsoleIo {
    input: Box<dyn BufRead + Send>,
    output: Box<dyn Write + Send>,
}

/// Blocking text prompts for batch runs.
///
/// Each prompt runs on the blocking thread pool so the scheduler keeps
/// driving network work while the user types. Invalid answers re-prompt;
/// end of input resolves to the request's default.
pub struct ConsoleGateway {
    io: Arc<Mutex<ConsoleIo>>,
}

impl ConsoleGateway {
    pub fn stdio() -> Self {
        Self::with_io(BufReader::new(io::stdin()), io::stdout())
    }

    pub fn with_io(input: impl BufRead + Send + 'static, output: impl Write + Send + 'static) -> Self {
        Self {
            io: Arc::new(Mutex::new(ConsoleIo {
                input: Box::new(input),
                output: Box::new(output),
            })),
        }
    }
}

#[async_trait]
impl InteractionGateway for ConsoleGateway {
    async fn respond(&self, request: InteractionRequest) -> InteractionResponse {
        let io = Arc::clone(&self.io);
        let fallback = request.default_response();
        let result = tokio::task::spawn_blocking(move || {
            let default = request.default_response();
            match io.lock() {
                Ok(mut io) => prompt_blocking(&mut io, &request).unwrap_or(default),
                Err(_) => default,
            }
        })
        .await;

        match result {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "console prompt task failed, using default");
                fallback
            }
        }
    }
}

/// `None` when input ends or the terminal breaks.
fn prompt_blocking(io: &mut ConsoleIo, request: &InteractionRequest) -> Option<InteractionResponse> {
    render(&mut io.output, request).ok()?;
    loop {
        write!(io.output, "{}", prompt_line(request)).ok()?;
        io.output.flush().ok()?;

        let mut line = String::new();
        if io.input.read_line(&mut line).ok()? == 0 {
            return None;
        }
        if let Some(response) = parse_answer(request, line.trim()) {
            return Some(response);
        }
        writeln!(io.output, "Invalid input, please try again.").ok()?;
    }
}

fn render(out: &mut dyn Write, request: &InteractionRequest) -> io::Result<()> {
    match request {
        InteractionRequest::TranslateTag { source, raw_tag } => {
            writeln!(out, "\n[{source}] untranslated tag: {raw_tag}")
        }
        InteractionRequest::MergeOrCreate { concept, candidate } => {
            writeln!(out, "\nNew tag「{concept}」looks like main tag「{candidate}」")?;
            writeln!(out, "  m. merge into「{candidate}」")?;
            writeln!(out, "  c. create「{concept}」as a new main tag")
        }
        InteractionRequest::SelectFromRanked { keyword, choices } => {
            writeln!(out, "\nNo confident match for「{keyword}」:")?;
            render_choices(out, choices)?;
            writeln!(out, "  0. none of these")
        }
        InteractionRequest::ConfirmDuplicate { title, candidates } => {
            writeln!(out, "\nPossible duplicates of「{title}」:")?;
            render_choices(out, candidates)?;
            writeln!(out, "Options:")?;
            writeln!(out, "  1. create a new record")?;
            if let Some(top) = candidates.first() {
                writeln!(out, "  2. update「{}」", top.label)?;
            }
            writeln!(out, "  3. skip this item")
        }
        InteractionRequest::ConfirmBrandMerge {
            name,
            candidate,
            score,
        } => writeln!(
            out,
            "\nBrand「{name}」resembles known brand「{candidate}」(similarity {score:.2})"
        ),
    }
}

fn render_choices(out: &mut dyn Write, choices: &[RankedChoice]) -> io::Result<()> {
    for (idx, choice) in choices.iter().enumerate() {
        match &choice.detail {
            Some(detail) => writeln!(
                out,
                "  {}. {} / {} (similarity {:.2})",
                idx + 1,
                choice.label,
                detail,
                choice.score
            )?,
            None => writeln!(out, "  {}. {} (similarity {:.2})", idx + 1, choice.label, choice.score)?,
        }
    }
    Ok(())
}

fn prompt_line(request: &InteractionRequest) -> String {
    match request {
        InteractionRequest::TranslateTag { .. } => {
            "Translation (empty or 's' skips, 'p' ignores permanently): ".to_string()
        }
        InteractionRequest::MergeOrCreate { .. } => "Choice [m/c]: ".to_string(),
        InteractionRequest::SelectFromRanked { choices, .. } => {
            format!("Select [0-{}]: ", choices.len())
        }
        InteractionRequest::ConfirmDuplicate { candidates, .. } if candidates.is_empty() => {
            "Choice [1/3]: ".to_string()
        }
        InteractionRequest::ConfirmDuplicate { .. } => "Choice [1/2/3]: ".to_string(),
        InteractionRequest::ConfirmBrandMerge { .. } => "Merge as alias? [y/n]: ".to_string(),
    }
}

fn parse_answer(request: &InteractionRequest, answer: &str) -> Option<InteractionResponse> {
    let lower = answer.to_lowercase();
    match request {
        InteractionRequest::TranslateTag { .. } => Some(InteractionResponse::Translation(
            match lower.as_str() {
                "" | "s" => TranslateDecision::Skip,
                "p" => TranslateDecision::IgnorePermanently,
                _ => TranslateDecision::Translate(answer.to_string()),
            },
        )),
        InteractionRequest::MergeOrCreate { .. } => match lower.as_str() {
            "m" | "merge" => Some(InteractionResponse::Merge(MergeDecision::Merge)),
            "c" | "create" => Some(InteractionResponse::Merge(MergeDecision::Create)),
            _ => None,
        },
        InteractionRequest::SelectFromRanked { choices, .. } => {
            let n: usize = lower.parse().ok()?;
            match n {
                0 => Some(InteractionResponse::Selection(None)),
                n if n <= choices.len() => Some(InteractionResponse::Selection(Some(n - 1))),
                _ => None,
            }
        }
        InteractionRequest::ConfirmDuplicate { candidates, .. } => match lower.as_str() {
            "1" => Some(InteractionResponse::Duplicate(DuplicateDecision::Create)),
            "2" if !candidates.is_empty() => {
                Some(InteractionResponse::Duplicate(DuplicateDecision::Update))
            }
            "3" => Some(InteractionResponse::Duplicate(DuplicateDecision::Skip)),
            _ => None,
        },
        InteractionRequest::ConfirmBrandMerge { .. } => match lower.as_str() {
            "y" | "yes" => Some(InteractionResponse::BrandMerge(MergeDecision::Merge)),
            "n" | "no" => Some(InteractionResponse::BrandMerge(MergeDecision::Create)),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use galsync_core::TagSource;
    use std::io::Cursor;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn gateway(input: &str) -> (ConsoleGateway, SharedBuf) {
        let out = SharedBuf::default();
        let gw = ConsoleGateway::with_io(Cursor::new(input.as_bytes().to_vec()), out.clone());
        (gw, out)
    }

    #[tokio::test]
    async fn test_translation_answers() {
        let (gw, _) = gateway("大小姐\n");
        assert_eq!(
            gw.translate_tag(TagSource::Dlsite, "お嬢様").await,
            TranslateDecision::Translate("大小姐".into())
        );

        let (gw, _) = gateway("p\n");
        assert_eq!(
            gw.translate_tag(TagSource::Fanza, "x").await,
            TranslateDecision::IgnorePermanently
        );

        let (gw, _) = gateway("\n");
        assert_eq!(gw.translate_tag(TagSource::Fanza, "x").await, TranslateDecision::Skip);
    }

    #[tokio::test]
    async fn test_invalid_input_reprompts() {
        let (gw, out) = gateway("maybe\n9\n2\n");
        let choices = vec![RankedChoice::new("A", 0.9), RankedChoice::new("B", 0.5)];
        assert_eq!(gw.select_from_ranked("kw", &choices).await, Some(1));
        assert_eq!(out.text().matches("Invalid input").count(), 2);
    }

    #[tokio::test]
    async fn test_zero_abandons_selection() {
        let (gw, _) = gateway("0\n");
        let choices = vec![RankedChoice::new("A", 0.9)];
        assert_eq!(gw.select_from_ranked("kw", &choices).await, None);
    }

    #[tokio::test]
    async fn test_end_of_input_uses_default() {
        let (gw, _) = gateway("");
        assert_eq!(gw.confirm_duplicate("t", &[]).await, DuplicateDecision::Skip);
        assert_eq!(gw.merge_or_create("a", "b").await, MergeDecision::Create);
    }

    #[tokio::test]
    async fn test_duplicate_menu_shows_candidates() {
        let (gw, out) = gateway("2\n");
        let candidates = vec![RankedChoice::new("Summer Pockets", 0.72)];
        assert_eq!(
            gw.confirm_duplicate("Summer Pockets REFLECTION BLUE", &candidates).await,
            DuplicateDecision::Update
        );
        let text = out.text();
        assert!(text.contains("1. Summer Pockets (similarity 0.72)"));
        assert!(text.contains("2. update「Summer Pockets」"));
    }

    #[tokio::test]
    async fn test_update_is_rejected_without_candidates() {
        let (gw, _) = gateway("2\n3\n");
        assert_eq!(gw.confirm_duplicate("t", &[]).await, DuplicateDecision::Skip);
    }

    #[tokio::test]
    async fn test_brand_merge_answers() {
        let (gw, _) = gateway("y\n");
        assert_eq!(gw.confirm_brand_merge("Key", "Key Visual Arts", 0.9).await, MergeDecision::Merge);
    }
}
