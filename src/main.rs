pub mod schema;
pub mod ir;
pub mod compile;
pub mod codegen;
pub mod load;
pub mod cli;

fn main() -> anyhow::Result<()> {
    let command_line_interface = cli::CommandLineInterface::load();
    command_line_interface.run()
}
