use controller::Workload;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&Workload::crd())?);
    Ok(())
}
