use super::Reporter;
use super::runnables::{self, RunnableSection};
use crate::context::GenerationContext;
use crate::error::Result;

const ACCESSORS: &str = r#"export const runFlow = <Path extends keyof typeof flows>(
  flowPath: Path,
  args: z.input<(typeof flows)[Path]>,
) => {
  const schema = flows[flowPath];

  return wmill.runFlow(flowPath, schema.parse(args));
};

export const runFlowAsync = <Path extends keyof typeof flows>(
  flowPath: Path,
  args: z.input<(typeof flows)[Path]>,
) => {
  const schema = flows[flowPath];

  return wmill.runFlowAsync(flowPath, schema.parse(args));
};
"#;

pub async fn generate(ctx: &mut GenerationContext<'_>, reporter: &Reporter) -> Result<()> {
    let client = ctx.client();
    let section = RunnableSection { map_name: "flows", accessors: ACCESSORS, options: &ctx.config().flows };
    runnables::generate(ctx, reporter, section, client.list_flows()).await
}
