use crate::config::WorkerDefinition;
use crate::env;
use crate::supervisor::LaunchCommand;

/// Translate a worker definition into the miner's command line.
///
/// `<path> -a <coin> -o <pool> -u <wallet> -p x -w <label> [-d <device>]`,
/// run from the directory holding the executable.
pub fn launch_command(definition: &WorkerDefinition) -> LaunchCommand {
    let mut args = vec![
        "-a".to_string(),
        definition.coin_symbol.clone(),
        "-o".to_string(),
        definition.pool_address.clone(),
        "-u".to_string(),
        definition.wallet_address.clone(),
        "-p".to_string(),
        env::worker::POOL_PASSWORD.to_string(),
        "-w".to_string(),
        definition.worker_label.clone(),
    ];
    if let Some(device) = definition.device_index {
        args.push("-d".to_string());
        args.push(device.to_string());
    }

    let path = &definition.executable_path;
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    let Some(parent) = parent else {
        // Bare program name, resolved through PATH.
        return LaunchCommand::new(path.to_string_lossy(), args);
    };

    // The child runs inside `parent`, so a relative path would no longer
    // point at the executable.
    let program = std::path::absolute(path).unwrap_or_else(|_| path.clone());
    let working_dir = std::path::absolute(parent).unwrap_or_else(|_| parent.to_path_buf());
    LaunchCommand::new(program.to_string_lossy(), args).with_working_dir(working_dir)
}
