fn main() -> anyhow::Result<()> {
    smol::block_on(devtunnel::run())
}
