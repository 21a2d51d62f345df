//! Machine translation of the transcript and subtitles.

use std::path::PathBuf;

use async_trait::async_trait;
use df_av::{TemplateContext, ToolCommand};
use df_core::config::{TranslationVariant, VariantKind};

use crate::context::RunContext;
use crate::stage::{Stage, StageResult};

/// Run every configured translation variant whose output is missing.
///
/// Variants are independent: one whose input does not exist is skipped with
/// a warning, and one failing does not stop the others.
#[derive(Debug, Default)]
pub struct TranslateStage;

impl TranslateStage {
    /// The command for `variant` and the path it writes to. Subtitle tools
    /// write a scratch file that is renamed afterwards; text output goes
    /// through the command's own stdout redirect.
    fn command(
        ctx: &RunContext,
        variant: &TranslationVariant,
    ) -> df_core::Result<(ToolCommand, PathBuf)> {
        let ws = &ctx.artifacts.working_set;
        let input = ws.artifact(&variant.input);
        let output = match variant.kind {
            VariantKind::Text => ws.artifact(&variant.output),
            VariantKind::Subtitle => ws.temp_artifact(&variant.output),
        };
        let vars = TemplateContext::new()
            .with_var("service", &ctx.config.translation_service)
            .with_path("fix_file", &ctx.fix_file)
            .with_path("input", &input)
            .with_path("output", &output);

        let mut cmd = ctx.tools.command(variant.tool_name())?;
        cmd.args(vars.substitute_all(&variant.args));
        if variant.kind == VariantKind::Text {
            cmd.stdin_file(input).stdout_file(&output);
        }
        Ok((cmd, output))
    }

    async fn translate(
        ctx: &RunContext,
        variant: &TranslationVariant,
    ) -> df_core::Result<PathBuf> {
        let target = ctx.artifacts.artifact(&variant.output);
        let (cmd, written) = Self::command(ctx, variant)?;
        if let Err(e) = ctx.runner.run(&cmd).await {
            if written != target {
                super::discard(&written);
            }
            return Err(e);
        }
        if written == target {
            super::require("Translate", &target)?;
            Ok(target)
        } else {
            df_av::finalize(&written, &target)
        }
    }
}

#[async_trait]
impl Stage for TranslateStage {
    fn name(&self) -> &'static str {
        "Translate"
    }

    fn is_done(&self, ctx: &RunContext) -> bool {
        ctx.config
            .translations
            .iter()
            .all(|v| ctx.artifacts.exists(&v.output))
    }

    async fn execute(&self, ctx: &RunContext) -> df_core::Result<StageResult> {
        let mut result = StageResult::new("Translated");
        let mut errors = Vec::new();

        for variant in &ctx.config.translations {
            if ctx.artifacts.exists(&variant.output) {
                continue;
            }
            if !ctx.artifacts.exists(&variant.input) {
                tracing::warn!(
                    "Skipping {} translation: {} does not exist",
                    variant.output,
                    ctx.artifacts.artifact(&variant.input).display()
                );
                continue;
            }

            tracing::info!("Translating {} -> {}", variant.input, variant.output);
            match Self::translate(ctx, variant).await {
                Ok(output) => result = result.with_output(output),
                Err(e) => {
                    tracing::warn!("Translation to {} failed: {e}", variant.output);
                    errors.push(e);
                }
            }
        }

        match errors.len() {
            0 => Ok(result),
            1 => Err(errors.remove(0)),
            n => Err(df_core::Error::pipeline(
                self.name(),
                format!(
                    "{n} translations failed: {}",
                    errors
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("; ")
                ),
            )),
        }
    }
}
