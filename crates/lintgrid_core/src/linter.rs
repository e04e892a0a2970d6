//! Lint orchestration.

use lintgrid_plugin::RuleEngine;
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::LinterError;
use crate::config::RuleConfig;
use crate::decoder::{Data, Decoder, FileDecoder};
use crate::fs::FileSystem;
use crate::resolver::{ResolvedDataFile, ResolvedTarget};
use crate::result::LintResult;
use crate::rule::{ExecutionMode, Node, RuleParser};

/// Value handed to a rule evaluation. Exactly one of `data` and
/// `combined_data` is set.
#[derive(Debug, Serialize)]
pub struct TopLevelArgument<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<&'a Data>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combined_data: Option<&'a [Data]>,
    pub config: &'a RuleConfig,
}

impl<'a> TopLevelArgument<'a> {
    pub fn per_file(data: &'a Data, config: &'a RuleConfig) -> Self {
        Self {
            data: Some(data),
            combined_data: None,
            config,
        }
    }

    pub fn combined(data: &'a [Data], config: &'a RuleConfig) -> Self {
        Self {
            data: None,
            combined_data: Some(data),
            config,
        }
    }
}

/// Runs parsed rules against the data files of resolved targets.
pub struct Linter<E: RuleEngine, D: Decoder = FileDecoder> {
    engine: E,
    decoder: D,
    fs: Box<dyn FileSystem>,
}

impl<E: RuleEngine> Linter<E> {
    pub fn new(engine: E, fs: Box<dyn FileSystem>) -> Self {
        Self {
            engine,
            decoder: FileDecoder,
            fs,
        }
    }
}

impl<E: RuleEngine, D: Decoder> Linter<E, D> {
    pub fn with_decoder<D2: Decoder>(self, decoder: D2) -> Linter<E, D2> {
        Linter {
            engine: self.engine,
            decoder,
            fs: self.fs,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub(crate) fn decoder(&self) -> &D {
        &self.decoder
    }

    pub(crate) fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    /// Lints every target. A parse error aborts the run; decode and
    /// evaluation failures are recorded on the affected results.
    ///
    /// Results are sorted by target id, lint file id and data file path.
    pub fn lint(&self, targets: &[ResolvedTarget]) -> Result<Vec<LintResult>, LinterError> {
        let mut results = Vec::new();
        for target in targets {
            results.extend(self.lint_target(target)?);
        }
        results.sort_by(|a, b| {
            (&a.target_id, &a.lint_file, &a.data_file).cmp(&(
                &b.target_id,
                &b.lint_file,
                &b.data_file,
            ))
        });
        Ok(results)
    }

    pub fn lint_target(&self, target: &ResolvedTarget) -> Result<Vec<LintResult>, LinterError> {
        debug!(
            target = %target.id,
            lint_files = target.lint_files.len(),
            data_files = target.data_files.len(),
            "linting target"
        );

        let parser = RuleParser::new(&self.engine, self.fs.as_ref());
        let nodes = parser.parse_all(&target.lint_files)?;
        let (combined, per_file): (Vec<_>, Vec<_>) = nodes
            .iter()
            .partition(|node| node.mode == ExecutionMode::Combined);

        let mut results = Vec::new();
        if !per_file.is_empty() {
            let per_data_file: Vec<Vec<LintResult>> = target
                .data_files
                .par_iter()
                .map(|file| self.lint_data_file(target, file, &per_file))
                .collect();
            results.extend(per_data_file.into_iter().flatten());
        }
        if !combined.is_empty() {
            results.extend(self.lint_combined(target, &combined));
        }
        Ok(results)
    }

    fn lint_data_file(
        &self,
        target: &ResolvedTarget,
        file: &ResolvedDataFile,
        nodes: &[&Node<E::Program>],
    ) -> Vec<LintResult> {
        let result_for = |node: &Node<E::Program>| LintResult {
            target_id: target.id.clone(),
            lint_file: node.key.clone(),
            data_file: Some(file.raw.clone()),
            link: node.link.clone(),
            ..LintResult::default()
        };

        match self.decoder.decode(self.fs.as_ref(), file) {
            Ok(data) => nodes
                .iter()
                .map(|&node| {
                    let tla = TopLevelArgument::per_file(&data, &node.config);
                    self.evaluate(result_for(node), node, &tla)
                })
                .collect(),
            Err(e) => {
                debug!(data_file = %file.raw, error = %e, "failed to decode data file");
                nodes
                    .iter()
                    .map(|&node| result_for(node).with_error(e.to_string()))
                    .collect()
            }
        }
    }

    /// Evaluates every combined rule once over all data files of the target.
    fn lint_combined(
        &self,
        target: &ResolvedTarget,
        nodes: &[&Node<E::Program>],
    ) -> Vec<LintResult> {
        let result_for = |node: &Node<E::Program>| LintResult {
            target_id: target.id.clone(),
            lint_file: node.key.clone(),
            data_files: target.data_files.iter().map(|f| f.raw.clone()).collect(),
            link: node.link.clone(),
            ..LintResult::default()
        };

        let decoded: Result<Vec<Data>, LinterError> = target
            .data_files
            .iter()
            .map(|file| self.decoder.decode(self.fs.as_ref(), file))
            .collect();

        match decoded {
            Ok(data) => nodes
                .iter()
                .map(|&node| {
                    let tla = TopLevelArgument::combined(&data, &node.config);
                    self.evaluate(result_for(node), node, &tla)
                })
                .collect(),
            Err(e) => nodes
                .iter()
                .map(|&node| result_for(node).with_error(e.to_string()))
                .collect(),
        }
    }

    fn evaluate(
        &self,
        result: LintResult,
        node: &Node<E::Program>,
        tla: &TopLevelArgument<'_>,
    ) -> LintResult {
        let tla_json = match serde_json::to_string(tla) {
            Ok(json) => json,
            Err(e) => return result.with_error(format!("serialize the top level argument: {e}")),
        };
        match self.engine.evaluate(&tla_json, &node.program) {
            Ok(output) => result.with_output(output),
            Err(e) => result.with_error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::FileType;
    use crate::fs::MemoryFs;
    use crate::resolver::ResolvedLintFile;
    use crate::test_utils::ScriptedEngine;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::PathBuf;

    fn lint(name: &str) -> ResolvedLintFile {
        ResolvedLintFile {
            id: format!("rules/{name}"),
            path: PathBuf::from(format!("/p/rules/{name}")),
            config: RuleConfig::new(),
            link: None,
        }
    }

    fn data(name: &str) -> ResolvedDataFile {
        ResolvedDataFile::new(name, format!("/p/{name}"))
    }

    fn target(id: &str, lint_files: &[&str], data_files: &[&str]) -> ResolvedTarget {
        ResolvedTarget {
            id: id.to_string(),
            lint_files: lint_files.iter().map(|n| lint(n)).collect(),
            data_files: data_files.iter().map(|n| data(n)).collect(),
        }
    }

    /// Rule files contain their own name, which doubles as the program key.
    fn project() -> MemoryFs {
        let mut fs = MemoryFs::new();
        for name in ["a.wasm", "b.wasm", "a_combine.wasm", "bad.wasm", "fails.wasm"] {
            fs = fs.with_file(format!("/p/rules/{name}"), name);
        }
        fs.with_file("/p/x.json", r#"{"n": 1}"#)
            .with_file("/p/y.json", r#"{"n": 2}"#)
            .with_file("/p/broken.json", "{")
    }

    fn linter(engine: ScriptedEngine) -> Linter<ScriptedEngine> {
        Linter::new(engine, Box::new(project()))
    }

    fn pairs(results: &[LintResult]) -> Vec<(&str, Option<&str>, Vec<&str>)> {
        results
            .iter()
            .map(|r| {
                (
                    r.lint_file.as_str(),
                    r.data_file.as_deref(),
                    r.data_files.iter().map(String::as_str).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_per_file_rules_run_once_per_pair() {
        let linter = linter(ScriptedEngine::new());
        let results = linter
            .lint(&[target("t", &["a.wasm", "b.wasm"], &["x.json"])])
            .unwrap();

        assert_eq!(
            pairs(&results),
            vec![
                ("rules/a.wasm", Some("x.json"), vec![]),
                ("rules/b.wasm", Some("x.json"), vec![]),
            ]
        );
        assert!(results.iter().all(|r| r.target_id == "t" && r.error.is_none()));
    }

    #[test]
    fn test_combined_rule_runs_once_per_target() {
        let linter = linter(ScriptedEngine::new());
        let results = linter
            .lint(&[target("t", &["a_combine.wasm", "b.wasm"], &["x.json", "y.json"])])
            .unwrap();

        assert_eq!(
            pairs(&results),
            vec![
                ("rules/a_combine.wasm", None, vec!["x.json", "y.json"]),
                ("rules/b.wasm", Some("x.json"), vec![]),
                ("rules/b.wasm", Some("y.json"), vec![]),
            ]
        );
        assert_eq!(linter.engine().calls("a_combine.wasm").len(), 1);
        assert_eq!(linter.engine().calls("b.wasm").len(), 2);
    }

    #[test]
    fn test_top_level_argument_shapes() {
        let mut t = target("t", &["a.wasm", "a_combine.wasm"], &["x.json"]);
        t.lint_files[0].config = json!({"max": 2}).as_object().cloned().unwrap();
        let linter = linter(ScriptedEngine::new());
        linter.lint(&[t]).unwrap();

        let x = json!({
            "text": r#"{"n": 1}"#,
            "value": {"n": 1},
            "file_path": "x.json",
            "file_type": "json",
        });
        assert_eq!(
            linter.engine().calls("a.wasm"),
            vec![json!({"data": x, "config": {"max": 2}})]
        );
        assert_eq!(
            linter.engine().calls("a_combine.wasm"),
            vec![json!({"combined_data": [x], "config": {}})]
        );
    }

    #[test]
    fn test_combined_rule_without_data_files() {
        let linter = linter(ScriptedEngine::new());
        let results = linter.lint(&[target("t", &["a_combine.wasm"], &[])]).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(
            linter.engine().calls("a_combine.wasm"),
            vec![json!({"combined_data": [], "config": {}})]
        );
    }

    #[test]
    fn test_decode_failure_is_local() {
        let linter = linter(ScriptedEngine::new());
        let results = linter
            .lint(&[target("t", &["a.wasm"], &["broken.json", "x.json"])])
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].data_file.as_deref(), Some("broken.json"));
        assert!(results[0].error.as_ref().unwrap().contains("broken.json"));
        assert_eq!(results[0].raw_output, "");
        assert_eq!(results[1].error, None);
        assert_eq!(linter.engine().calls("a.wasm").len(), 1);
    }

    #[test]
    fn test_decode_failure_fails_combined_results() {
        let linter = linter(ScriptedEngine::new());
        let results = linter
            .lint(&[target("t", &["a_combine.wasm"], &["x.json", "broken.json"])])
            .unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].error.is_some());
        assert!(linter.engine().calls("a_combine.wasm").is_empty());
    }

    #[test]
    fn test_evaluation_failure_is_local() {
        let engine = ScriptedEngine::new()
            .fail("fails.wasm", "trap")
            .output("a.wasm", json!([{"name": "ok", "level": "info"}]));
        let linter = linter(engine);
        let results = linter
            .lint(&[target("t", &["a.wasm", "fails.wasm"], &["x.json"])])
            .unwrap();

        assert_eq!(results[0].lint_file, "rules/a.wasm");
        assert_eq!(results[0].raw_results.as_ref().unwrap()[0].name, "ok");
        assert_eq!(results[1].lint_file, "rules/fails.wasm");
        assert!(results[1].error.as_ref().unwrap().contains("trap"));
    }

    #[test]
    fn test_parse_failure_aborts() {
        let linter = linter(ScriptedEngine::new().fail_parse("bad.wasm"));
        let err = linter
            .lint(&[target("t", &["a.wasm", "bad.wasm"], &["x.json"])])
            .unwrap_err();

        assert!(matches!(err, LinterError::Parse { .. }));
        assert!(linter.engine().calls("a.wasm").is_empty());
    }

    #[test]
    fn test_results_are_sorted() {
        let linter = linter(ScriptedEngine::new());
        let results = linter
            .lint(&[
                target("zeta", &["b.wasm", "a.wasm"], &["y.json", "x.json"]),
                target("alpha", &["b.wasm"], &["x.json"]),
            ])
            .unwrap();

        let keys: Vec<(&str, &str, &str)> = results
            .iter()
            .map(|r| {
                (
                    r.target_id.as_str(),
                    r.lint_file.as_str(),
                    r.data_file.as_deref().unwrap_or_default(),
                )
            })
            .collect();
        assert_eq!(
            keys,
            vec![
                ("alpha", "rules/b.wasm", "x.json"),
                ("zeta", "rules/a.wasm", "x.json"),
                ("zeta", "rules/a.wasm", "y.json"),
                ("zeta", "rules/b.wasm", "x.json"),
                ("zeta", "rules/b.wasm", "y.json"),
            ]
        );
    }

    #[test]
    fn test_non_json_output_is_an_error() {
        let linter = linter(ScriptedEngine::new().raw("a.wasm", "not json"));
        let results = linter.lint(&[target("t", &["a.wasm"], &["x.json"])]).unwrap();

        assert!(results[0].error.as_ref().unwrap().contains("not valid JSON"));
        assert_eq!(results[0].raw_output, "not json");
    }

    /// Hands rules the data file path instead of its contents.
    struct PathDecoder;

    impl Decoder for PathDecoder {
        fn decode(
            &self,
            _fs: &dyn FileSystem,
            file: &ResolvedDataFile,
        ) -> Result<Data, LinterError> {
            Ok(Data {
                text: String::new(),
                value: json!(file.raw),
                file_path: file.raw.clone(),
                file_type: FileType::PlainText,
            })
        }
    }

    #[test]
    fn test_custom_decoder() {
        let linter = linter(ScriptedEngine::new()).with_decoder(PathDecoder);
        let results = linter
            .lint(&[target("t", &["a.wasm", "a_combine.wasm"], &["broken.json"])])
            .unwrap();

        assert!(results.iter().all(|r| r.error.is_none()));
        assert_eq!(
            linter.engine().calls("a.wasm")[0]["data"]["value"],
            json!("broken.json")
        );
        assert_eq!(
            linter.engine().calls("a_combine.wasm")[0]["combined_data"][0]["file_type"],
            json!("plain_text")
        );
    }

    #[test]
    fn test_link_is_carried_to_results() {
        let mut t = target("t", &["a.wasm"], &["x.json"]);
        t.lint_files[0].link = Some("https://github.com/o/r/blob/ref/a.wasm".to_string());
        let linter = linter(ScriptedEngine::new().output("a.wasm", json!([{"name": "n"}])));

        let results = linter.lint(&[t]).unwrap();
        let findings = results[0].flatten();
        assert_eq!(findings[0].links[0].link, "https://github.com/o/r/blob/ref/a.wasm");
    }

    #[test]
    fn test_rules_receive_data_dependent_input() {
        let engine = ScriptedEngine::new().respond("a.wasm", |tla| {
            let n = tla["data"]["value"]["n"].as_i64().unwrap_or_default();
            Ok(json!([{"name": "n", "message": format!("n={n}"), "excluded": n == 1}]).to_string())
        });
        let linter = linter(engine);
        let results = linter
            .lint(&[target("t", &["a.wasm"], &["x.json", "y.json"])])
            .unwrap();

        let messages: Vec<String> = results
            .iter()
            .flat_map(LintResult::flatten)
            .map(|f| f.message)
            .collect();
        assert_eq!(messages, vec!["n=2"]);
    }
}
