//! Facade abstraction and the rendering engine that walks a parsed template
//! against one (`spec.md` §4.G "Facade abstraction").
//!
//! Grounded on `object_facade`/`report_facade`/`build_facade`/`files_facade`
//! in the original `cov` tool's `format/facades.cc`: the formatter never
//! touches a concrete object type, only this capability interface.

use crate::errors::CovError;
use crate::format::color::{self, color_for_rating, ColorSpec, NamedColor};
use crate::format::date::relative_date;
use crate::format::parser::{
    self, Directive, HashSlot, Node, PersonField, StatKind, StatMetric, Who, Width,
};
use crate::hash::Oid;
use crate::internal::codec::report::{BuildSummary, Report, Signature};
use crate::internal::codec::{CoverageStats, RatingThresholds};

/// A Git commit's view as seen through a `Report`'s embedded `CommitView`
/// (`spec.md` §4.G "optional git view").
#[derive(Debug, Clone)]
pub struct GitView {
    pub branch: String,
    pub message: String,
    pub author: Signature,
    pub committer: Signature,
    pub commit_time_utc: i64,
}

/// The capability interface the formatter asks of whatever object it's
/// rendering. Concrete objects (report, build, files) implement this without
/// the renderer knowing their kind.
pub trait Facade {
    fn name(&self) -> &str;

    fn primary_id(&self) -> Option<Oid> {
        None
    }
    fn secondary_id(&self) -> Option<Oid> {
        None
    }
    fn tertiary_id(&self) -> Option<Oid> {
        None
    }
    fn quaternary_id(&self) -> Option<Oid> {
        None
    }

    fn stats(&self) -> Option<CoverageStats> {
        None
    }

    fn added_time_utc(&self) -> Option<i64> {
        None
    }

    fn git(&self) -> Option<&GitView> {
        None
    }

    /// Ref decorations attached to this subject, rendered verbatim (already
    /// wrapped or not per `wrapped`).
    fn ref_names(&self, _wrapped: bool) -> String {
        String::new()
    }

    /// Child facades reachable under `key` (e.g. `"B"` for a report's
    /// builds).
    fn children(&self, _key: &str) -> Vec<Box<dyn Facade + '_>> {
        Vec::new()
    }

    /// Ad-hoc conditions beyond the ones the renderer already knows how to
    /// derive from `stats()`/`git()`/the hash ids (e.g. a build's `"prop"`).
    fn extra_condition(&self, _ref: &str) -> Option<bool> {
        None
    }
}

/// Render-time knobs: colorizer on/off, reference "now" for relative dates,
/// and the current word-wrap width (mutated by `%w(...)` mid-template).
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub colorize: bool,
    pub now_utc: i64,
    pub rating_thresholds: RatingThresholds,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            colorize: false,
            now_utc: 0,
            rating_thresholds: RatingThresholds::default(),
        }
    }
}

struct Engine {
    options: RenderOptions,
    width: Width,
    current_color: Option<NamedColor>,
    out: String,
}

/// Parse `template` and render it against `facade`.
pub fn format(template: &str, facade: &dyn Facade, options: RenderOptions) -> Result<String, CovError> {
    let nodes = parser::parse_template(template)?;
    let mut engine = Engine {
        options,
        width: Width::default(),
        current_color: None,
        out: String::new(),
    };
    engine.render_nodes(&nodes, facade)?;
    Ok(engine.out)
}

impl Engine {
    fn render_nodes(&mut self, nodes: &[Node], facade: &dyn Facade) -> Result<(), CovError> {
        for node in nodes {
            self.render_node(node, facade)?;
        }
        Ok(())
    }

    fn render_node(&mut self, node: &Node, facade: &dyn Facade) -> Result<(), CovError> {
        match node {
            Node::Text(text) => {
                let painted = match self.current_color {
                    Some(color) => self.paint(color, text),
                    None => text.clone(),
                };
                self.out.push_str(&painted);
            }
            Node::Directive(d) => self.render_directive(d, facade),
            Node::Block {
                conditional,
                reference,
                children,
            } => {
                if *conditional {
                    if self.condition(reference, facade) {
                        self.render_nodes(children, facade)?;
                    }
                } else {
                    for child in facade.children(reference) {
                        self.render_nodes(children, child.as_ref())?;
                    }
                }
            }
        }
        Ok(())
    }

    fn condition(&self, reference: &str, facade: &dyn Facade) -> bool {
        if let Some(explicit) = facade.extra_condition(reference) {
            return explicit;
        }
        match reference {
            "" | "pT" => facade.stats().is_some(),
            "pL" => facade.stats().is_some_and(|s| s.lines_total > 0),
            "pTL" => facade.stats().is_some_and(|s| s.lines.relevant > 0),
            "pTF" => facade.stats().is_some_and(|s| s.functions.relevant > 0),
            "pTB" => facade.stats().is_some_and(|s| s.branches.relevant > 0),
            "H1" => facade.primary_id().is_some(),
            "H2" => facade.secondary_id().is_some(),
            "H3" => facade.tertiary_id().is_some(),
            "H4" => facade.quaternary_id().is_some(),
            "rd" => facade.added_time_utc().is_some(),
            "git" => facade.git().is_some(),
            other => !facade.children(other).is_empty(),
        }
    }

    fn render_directive(&mut self, directive: &Directive, facade: &dyn Facade) {
        match directive {
            Directive::Hash { slot, abbreviated } => {
                let id = match slot {
                    HashSlot::Primary => facade.primary_id(),
                    HashSlot::Secondary => facade.secondary_id(),
                    HashSlot::Tertiary => facade.tertiary_id(),
                    HashSlot::Quaternary => facade.quaternary_id(),
                };
                if let Some(id) = id {
                    let text = id.to_string();
                    if *abbreviated {
                        self.out.push_str(&text[..8.min(text.len())]);
                    } else {
                        self.out.push_str(&text);
                    }
                }
            }
            Directive::RefNames { unwrapped } => {
                self.out.push_str(&facade.ref_names(!unwrapped));
            }
            Directive::MagicRefNames { unwrapped } => {
                let names = facade.ref_names(!unwrapped);
                if names.is_empty() {
                    return;
                }
                self.out.push_str(&self.paint(NamedColor::Yellow, &names));
            }
            Directive::Subject => {
                if let Some(git) = facade.git() {
                    self.out.push_str(subject_of(&git.message));
                }
            }
            Directive::SubjectSanitized => {
                if let Some(git) = facade.git() {
                    self.out.push_str(&sanitize_subject(subject_of(&git.message)));
                }
            }
            Directive::Body => {
                if let Some(git) = facade.git() {
                    let wrapped = wrap_text(body_of(&git.message).trim(), self.width);
                    self.out.push_str(&wrapped);
                }
            }
            Directive::BodyRaw => {
                if let Some(git) = facade.git() {
                    self.out.push_str(&git.message);
                }
            }
            Directive::ReportBranch => {
                if let Some(git) = facade.git() {
                    self.out.push_str(&git.branch);
                }
            }
            Directive::Person { who, field } => {
                self.render_person(*who, *field, facade);
            }
            Directive::Stat(st) => {
                self.render_stat(*st, facade);
            }
            Directive::Color(spec) => {
                self.apply_color(*spec, facade);
            }
            Directive::Width(w) => {
                self.width = *w;
            }
        }
    }

    fn render_person(&mut self, who: Who, field: PersonField, facade: &dyn Facade) {
        let git = match facade.git() {
            Some(g) => g,
            None => return,
        };
        if who == Who::Reporter {
            let when = match facade.added_time_utc() {
                Some(t) => t,
                None => return,
            };
            self.out.push_str(&render_date_field(field, when, self.options.now_utc));
            return;
        }
        let signature = match who {
            Who::Author => &git.author,
            Who::Committer => &git.committer,
            Who::Reporter => unreachable!(),
        };
        match field {
            PersonField::Name => self.out.push_str(&signature.name),
            PersonField::Email => self.out.push_str(&signature.email),
            PersonField::EmailLocal => {
                let local = signature.email.split('@').next().unwrap_or(&signature.email);
                self.out.push_str(local);
            }
            _ => self
                .out
                .push_str(&render_date_field(field, git.commit_time_utc, self.options.now_utc)),
        }
    }

    fn render_stat(&mut self, st: parser::StatDirective, facade: &dyn Facade) {
        let stats = match facade.stats() {
            Some(s) => s,
            None => return,
        };
        let pair = match st.kind {
            StatKind::Lines => stats.lines,
            StatKind::Functions => stats.functions,
            StatKind::Branches => stats.branches,
        };
        match st.metric {
            StatMetric::Count => self.out.push_str(&stats.lines_total.to_string()),
            StatMetric::Total => self.out.push_str(&pair.relevant.to_string()),
            StatMetric::Visited => self.out.push_str(&pair.visited.to_string()),
            StatMetric::Percent => {
                let pct = if pair.relevant == 0 {
                    0.0
                } else {
                    100.0 * pair.visited as f64 / pair.relevant as f64
                };
                self.out.push_str(&format!("{pct:.2}%"));
            }
            StatMetric::Rating => {
                let rating = pair.rating(&self.options.rating_thresholds);
                let text = format!("{rating:?}").to_lowercase();
                let color = color_for_rating(rating);
                self.out.push_str(&self.paint(color, &text));
            }
        }
    }

    /// `%C...` sets the color applied to subsequent literal text until the
    /// next color directive; `%Creset` (or `%C(reset)`) clears it.
    fn apply_color(&mut self, spec: ColorSpec, facade: &dyn Facade) {
        self.current_color = match spec {
            ColorSpec::Reset => None,
            ColorSpec::Named(c) => Some(c),
            ColorSpec::Rating(kind) => {
                let stats = match facade.stats() {
                    Some(s) => s,
                    None => return,
                };
                let pair = match kind {
                    color::StatKind::Lines => stats.lines,
                    color::StatKind::Functions => stats.functions,
                    color::StatKind::Branches => stats.branches,
                };
                let rating = pair.rating(&self.options.rating_thresholds);
                Some(color_for_rating(rating))
            }
        };
    }

    fn paint(&self, color: NamedColor, text: &str) -> String {
        color::paint(self.options.colorize, color, text)
    }
}

fn render_date_field(field: PersonField, when: i64, now: i64) -> String {
    match field {
        PersonField::Date => format_iso_like(when),
        PersonField::DateRelative => relative_date(now, when),
        PersonField::DateTimestamp => when.to_string(),
        PersonField::DateIsoLike => format_iso_like(when),
        PersonField::DateIsoStrict => format_iso_strict(when),
        PersonField::DateShort => format_short_date(when),
        PersonField::Name | PersonField::Email | PersonField::EmailLocal => String::new(),
    }
}

fn format_iso_like(epoch: i64) -> String {
    use chrono::{TimeZone, Utc};
    Utc.timestamp_opt(epoch, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S +0000").to_string())
        .unwrap_or_default()
}

fn format_iso_strict(epoch: i64) -> String {
    use chrono::{TimeZone, Utc};
    Utc.timestamp_opt(epoch, 0)
        .single()
        .map(|t| t.format("%Y-%m-%dT%H:%M:%S+00:00").to_string())
        .unwrap_or_default()
}

fn format_short_date(epoch: i64) -> String {
    use chrono::{TimeZone, Utc};
    Utc.timestamp_opt(epoch, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn subject_of(message: &str) -> &str {
    message.split("\n\n").next().unwrap_or(message).trim_end()
}

fn body_of(message: &str) -> &str {
    match message.split_once("\n\n") {
        Some((_, rest)) => rest,
        None => "",
    }
}

/// Wrap `text` at `width.total`, indenting the first line by `width.indent1`
/// and continuation lines by `width.indent2`; a word longer than the
/// available width gets its own line rather than being split (`spec.md`
/// §4.G "Word-wrap").
fn wrap_text(text: &str, width: Width) -> String {
    let mut out = String::new();
    for (i, paragraph) in text.split("\n\n").enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        out.push_str(&wrap_paragraph(paragraph, width));
    }
    out
}

fn wrap_paragraph(paragraph: &str, width: Width) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();
    let mut first_line = true;

    let indent_of = |first: bool| " ".repeat(if first { width.indent1 } else { width.indent2 } as usize);

    for word in paragraph.split_whitespace() {
        let indent = indent_of(first_line);
        if line.is_empty() {
            line = word.to_string();
        } else if indent.len() + line.len() + 1 + word.len() <= width.total as usize {
            line.push(' ');
            line.push_str(word);
        } else {
            lines.push(format!("{indent}{line}"));
            first_line = false;
            line = word.to_string();
        }
    }
    if !line.is_empty() {
        let indent = indent_of(first_line);
        lines.push(format!("{indent}{line}"));
    }
    lines.join("\n")
}

fn sanitize_subject(subject: &str) -> String {
    let mut out = String::with_capacity(subject.len());
    let mut last_was_dash = false;
    for c in subject.chars() {
        if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
            out.push(c);
            last_was_dash = false;
        } else if !last_was_dash {
            out.push('-');
            last_was_dash = true;
        }
    }
    while out.ends_with('.') || out.ends_with('-') {
        out.pop();
    }
    let mut deduped = String::with_capacity(out.len());
    let mut last_dot = false;
    for c in out.chars() {
        if c == '.' {
            if last_dot {
                continue;
            }
            last_dot = true;
        } else {
            last_dot = false;
        }
        deduped.push(c);
    }
    deduped
}

/// A `Report`'s view through the formatter facade: name `"report"`,
/// primary/secondary/tertiary/quaternary = self/files/parent/commit hash,
/// `"B"` children = its builds.
pub struct ReportFacade<'a> {
    report: &'a Report,
    oid: Oid,
    git_view: GitView,
}

impl<'a> ReportFacade<'a> {
    pub fn new(report: &'a Report, oid: Oid) -> Self {
        let git_view = GitView {
            branch: report.commit.branch.clone(),
            message: report.commit.message.clone(),
            author: report.commit.author.clone(),
            committer: report.commit.committer.clone(),
            commit_time_utc: report.commit.commit_time_utc,
        };
        ReportFacade {
            report,
            oid,
            git_view,
        }
    }
}

impl<'a> Facade for ReportFacade<'a> {
    fn name(&self) -> &str {
        "report"
    }

    fn primary_id(&self) -> Option<Oid> {
        Some(self.oid)
    }

    fn secondary_id(&self) -> Option<Oid> {
        Some(self.report.file_list_oid)
    }

    fn tertiary_id(&self) -> Option<Oid> {
        if self.report.parent_oid == Oid::zero() {
            None
        } else {
            Some(self.report.parent_oid)
        }
    }

    fn quaternary_id(&self) -> Option<Oid> {
        if self.report.commit.commit_id == Oid::zero() {
            None
        } else {
            Some(self.report.commit.commit_id)
        }
    }

    fn stats(&self) -> Option<CoverageStats> {
        Some(self.report.stats)
    }

    fn added_time_utc(&self) -> Option<i64> {
        Some(self.report.add_time_utc)
    }

    fn git(&self) -> Option<&GitView> {
        Some(&self.git_view)
    }

    fn children(&self, key: &str) -> Vec<Box<dyn Facade + '_>> {
        if key == "B" || key == "build" {
            self.report
                .builds
                .iter()
                .map(|b| Box::new(BuildFacade::from_summary(b)) as Box<dyn Facade + '_>)
                .collect()
        } else {
            Vec::new()
        }
    }
}

/// A `Build`'s view: name `"build"`, primary = self hash, secondary = file
/// list hash. `props` is exposed through `extra_condition("prop")`.
pub struct BuildFacade {
    oid: Option<Oid>,
    file_list_oid: Option<Oid>,
    add_time_utc: Option<i64>,
    stats: CoverageStats,
    has_props: bool,
}

impl BuildFacade {
    pub fn from_summary(summary: &BuildSummary) -> Self {
        BuildFacade {
            oid: Some(summary.build_oid),
            file_list_oid: None,
            add_time_utc: None,
            stats: summary.stats,
            has_props: !summary.propset_json.trim().is_empty() && summary.propset_json != "{}",
        }
    }

    pub fn from_full(oid: Oid, build: &crate::internal::codec::build::Build) -> Self {
        BuildFacade {
            oid: Some(oid),
            file_list_oid: Some(build.file_list_oid),
            add_time_utc: Some(build.add_time_utc),
            stats: build.stats,
            has_props: !build.propset_json.trim().is_empty() && build.propset_json != "{}",
        }
    }
}

impl Facade for BuildFacade {
    fn name(&self) -> &str {
        "build"
    }

    fn primary_id(&self) -> Option<Oid> {
        self.oid
    }

    fn secondary_id(&self) -> Option<Oid> {
        self.file_list_oid
    }

    fn stats(&self) -> Option<CoverageStats> {
        Some(self.stats)
    }

    fn added_time_utc(&self) -> Option<i64> {
        self.add_time_utc
    }

    fn extra_condition(&self, reference: &str) -> Option<bool> {
        if reference == "prop" || reference.is_empty() {
            Some(self.has_props)
        } else {
            None
        }
    }
}

/// A `Files` snapshot's view: name `"files"`, only a primary hash, no stats
/// of its own (per-file stats live on the diff engine's output, not here).
pub struct FilesFacade {
    oid: Oid,
}

impl FilesFacade {
    pub fn new(oid: Oid) -> Self {
        FilesFacade { oid }
    }
}

impl Facade for FilesFacade {
    fn name(&self) -> &str {
        "files"
    }

    fn primary_id(&self) -> Option<Oid> {
        Some(self.oid)
    }
}
