use super::Reporter;
use super::runnables::{self, RunnableSection};
use crate::context::GenerationContext;
use crate::error::Result;

const ACCESSORS: &str = r#"export const runScript = <Path extends keyof typeof scripts>(
  scriptPath: Path,
  args: z.input<(typeof scripts)[Path]>,
) => {
  const schema = scripts[scriptPath];

  return wmill.runScript(scriptPath, null, schema.parse(args));
};

export const runScriptAsync = <Path extends keyof typeof scripts>(
  scriptPath: Path,
  args: z.input<(typeof scripts)[Path]>,
) => {
  const schema = scripts[scriptPath];

  return wmill.runScriptAsync(scriptPath, null, schema.parse(args));
};
"#;

pub async fn generate(ctx: &mut GenerationContext<'_>, reporter: &Reporter) -> Result<()> {
    let client = ctx.client();
    let section = RunnableSection { map_name: "scripts", accessors: ACCESSORS, options: &ctx.config().scripts };
    runnables::generate(ctx, reporter, section, client.list_scripts()).await
}
