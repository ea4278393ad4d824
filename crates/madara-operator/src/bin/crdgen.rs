use kube::CustomResourceExt;
use madara_operator::MadaraChain;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&MadaraChain::crd())?);
    Ok(())
}
